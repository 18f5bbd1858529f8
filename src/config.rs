use crate::error::ConfigError;
use dotenvy::dotenv;
use std::env;

/// How AI answers are delivered in guild channels (`REPLY_STYLE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStyle {
    /// 1: reply to the message and ping the author
    ReplyWithPing,
    /// 2: reply to the message without pinging
    ReplyNoPing,
    /// 3: plain message in the channel
    DirectMessage,
}

impl ReplyStyle {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim() {
            "1" => Ok(Self::ReplyWithPing),
            "2" => Ok(Self::ReplyNoPing),
            "3" => Ok(Self::DirectMessage),
            other => Err(ConfigError::Invalid {
                var: "REPLY_STYLE",
                value: other.to_string(),
                expected: "1, 2 or 3",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Idle,
    DoNotDisturb,
    Invisible,
}

impl PresenceStatus {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "idle" => Ok(Self::Idle),
            "dnd" => Ok(Self::DoNotDisturb),
            "invisible" => Ok(Self::Invisible),
            other => Err(ConfigError::Invalid {
                var: "STATUS",
                value: other.to_string(),
                expected: "online, idle, dnd or invisible",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Playing,
    Streaming,
    Listening,
    Watching,
    Competing,
    Custom,
    None,
}

impl ActivityKind {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_lowercase().as_str() {
            "playing" => Ok(Self::Playing),
            "streaming" => Ok(Self::Streaming),
            "listening" => Ok(Self::Listening),
            "watching" => Ok(Self::Watching),
            "competing" => Ok(Self::Competing),
            "custom" => Ok(Self::Custom),
            "none" => Ok(Self::None),
            other => Err(ConfigError::Invalid {
                var: "ACTIVITY_TYPE",
                value: other.to_string(),
                expected: "playing, streaming, listening, watching, competing, custom or none",
            }),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    pub shapes_api_key: String,
    pub shapes_username: String,
    pub shapes_app_id: Option<String>,
    pub shapes_api_url: String,
    pub shapes_auth_url: String,
    pub shapes_timeout_secs: u64,
    pub shapes_max_retries: u32,
    pub bot_owner: Option<u64>,
    pub reply_style: ReplyStyle,
    pub trigger_words: Vec<String>,
    pub error_message: Option<String>,
    pub status: PresenceStatus,
    pub activity_type: ActivityKind,
    pub activity_message: Option<String>,
    pub database_url: String,
    pub revive_silence_secs: Option<u64>,
    pub register_commands: bool,
    pub dev_guild_id: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> Result<Self, ConfigError> {
        Ok(Config {
            bot_token: required("BOT_TOKEN")?,
            shapes_api_key: required("SHAPES_API_KEY")?,
            shapes_username: required("SHAPES_USERNAME")?,
            shapes_app_id: optional("SHAPES_APP_ID"),
            shapes_api_url: optional("SHAPES_API_URL")
                .unwrap_or_else(|| "https://api.shapes.inc/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            shapes_auth_url: optional("SHAPES_AUTH_URL")
                .unwrap_or_else(|| "https://api.shapes.inc/auth".to_string())
                .trim_end_matches('/')
                .to_string(),
            shapes_timeout_secs: parsed("SHAPES_TIMEOUT_SECS", "a number of seconds")?
                .unwrap_or(60),
            shapes_max_retries: parsed("SHAPES_MAX_RETRIES", "a non-negative integer")?
                .unwrap_or(0),
            bot_owner: parsed("BOT_OWNER", "a Discord user id")?,
            reply_style: optional("REPLY_STYLE")
                .map(|v| ReplyStyle::parse(&v))
                .transpose()?
                .unwrap_or(ReplyStyle::ReplyWithPing),
            trigger_words: optional("TRIGGER_WORDS")
                .map(|v| parse_trigger_words(&v))
                .unwrap_or_default(),
            error_message: optional("ERROR_MESSAGE"),
            status: optional("STATUS")
                .map(|v| PresenceStatus::parse(&v))
                .transpose()?
                .unwrap_or(PresenceStatus::Online),
            activity_type: optional("ACTIVITY_TYPE")
                .map(|v| ActivityKind::parse(&v))
                .transpose()?
                .unwrap_or(ActivityKind::None),
            activity_message: optional("ACTIVITY_MESSAGE"),
            database_url: optional("DATABASE_URL")
                .unwrap_or_else(|| "data/shapes.db".to_string()),
            revive_silence_secs: parsed("REVIVE_SILENCE_SECS", "a number of seconds")?,
            register_commands: parsed("REGISTER_COMMANDS", "true or false")?.unwrap_or(true),
            dev_guild_id: parsed("DEV_GUILD_ID", "a Discord guild id")?,
        })
    }

    /// The model identifier the Shapes API expects for this shape.
    pub fn shapes_model(&self) -> String {
        format!("shapesinc/{}", self.shapes_username)
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    optional(var).ok_or(ConfigError::Missing(var))
}

/// Unset and blank values are treated the same.
fn optional(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match optional(var) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| ConfigError::Invalid {
            var,
            value: raw,
            expected,
        }),
    }
}

pub fn parse_trigger_words(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"[REDACTED]")
            .field("shapes_api_key", &"[REDACTED]")
            .field("shapes_username", &self.shapes_username)
            .field("shapes_app_id", &self.shapes_app_id)
            .field("shapes_api_url", &self.shapes_api_url)
            .field("shapes_auth_url", &self.shapes_auth_url)
            .field("shapes_timeout_secs", &self.shapes_timeout_secs)
            .field("shapes_max_retries", &self.shapes_max_retries)
            .field("bot_owner", &self.bot_owner)
            .field("reply_style", &self.reply_style)
            .field("trigger_words", &self.trigger_words)
            .field("error_message", &self.error_message)
            .field("status", &self.status)
            .field("activity_type", &self.activity_type)
            .field("activity_message", &self.activity_message)
            .field("database_url", &self.database_url)
            .field("revive_silence_secs", &self.revive_silence_secs)
            .field("register_commands", &self.register_commands)
            .field("dev_guild_id", &self.dev_guild_id)
            .finish()
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
/// Chunk size for relayed answers, leaving room for reply decorations
pub const RELAY_CHUNK_LIMIT: usize = 1900;

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        bot_token: "test".to_string(),
        shapes_api_key: "key".to_string(),
        shapes_username: "tester".to_string(),
        shapes_app_id: None,
        shapes_api_url: "https://api.shapes.inc/v1".to_string(),
        shapes_auth_url: "https://api.shapes.inc/auth".to_string(),
        shapes_timeout_secs: 60,
        shapes_max_retries: 0,
        bot_owner: Some(1),
        reply_style: ReplyStyle::ReplyWithPing,
        trigger_words: Vec::new(),
        error_message: None,
        status: PresenceStatus::Online,
        activity_type: ActivityKind::None,
        activity_message: None,
        database_url: ":memory:".to_string(),
        revive_silence_secs: None,
        register_commands: false,
        dev_guild_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    const VARS: [&str; 8] = [
        "BOT_TOKEN",
        "SHAPES_API_KEY",
        "SHAPES_USERNAME",
        "BOT_OWNER",
        "REPLY_STYLE",
        "TRIGGER_WORDS",
        "STATUS",
        "ACTIVITY_TYPE",
    ];

    // Environment variables are process-wide, so every scenario lives in one test.
    #[test]
    fn test_config_logic() {
        for var in VARS {
            env::remove_var(var);
        }

        // 1. Missing required vars
        assert!(matches!(
            Config::build(),
            Err(ConfigError::Missing("BOT_TOKEN"))
        ));

        // 2. Defaults
        env::set_var("BOT_TOKEN", "test_token");
        env::set_var("SHAPES_API_KEY", "secret_api_key");
        env::set_var("SHAPES_USERNAME", "myshape");
        let config = Config::build().unwrap();
        assert_eq!(config.shapes_model(), "shapesinc/myshape");
        assert_eq!(config.reply_style, ReplyStyle::ReplyWithPing);
        assert_eq!(config.status, PresenceStatus::Online);
        assert_eq!(config.activity_type, ActivityKind::None);
        assert_eq!(config.bot_owner, None);
        assert_eq!(config.shapes_max_retries, 0);

        // 3. Explicit values
        env::set_var("REPLY_STYLE", "2");
        env::set_var("TRIGGER_WORDS", " Hello, ,SHAPE ");
        env::set_var("STATUS", "DND");
        env::set_var("ACTIVITY_TYPE", "watching");
        env::set_var("BOT_OWNER", "42");
        let config = Config::build().unwrap();
        assert_eq!(config.reply_style, ReplyStyle::ReplyNoPing);
        assert_eq!(config.trigger_words, vec!["hello", "shape"]);
        assert_eq!(config.status, PresenceStatus::DoNotDisturb);
        assert_eq!(config.activity_type, ActivityKind::Watching);
        assert_eq!(config.bot_owner, Some(42));

        // 4. Malformed values are fatal
        env::set_var("REPLY_STYLE", "4");
        assert!(matches!(
            Config::build(),
            Err(ConfigError::Invalid { var: "REPLY_STYLE", .. })
        ));
        env::set_var("REPLY_STYLE", "1");
        env::set_var("BOT_OWNER", "not-a-number");
        assert!(matches!(
            Config::build(),
            Err(ConfigError::Invalid { var: "BOT_OWNER", .. })
        ));
        env::remove_var("BOT_OWNER");

        // 5. Debug redaction
        let debug_output = format!("{:?}", Config::build().unwrap());
        assert!(!debug_output.contains("test_token"));
        assert!(!debug_output.contains("secret_api_key"));
        assert!(debug_output.contains("[REDACTED]"));

        for var in VARS {
            env::remove_var(var);
        }
    }
}
