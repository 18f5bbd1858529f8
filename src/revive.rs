use crate::activity::ChannelActivity;
use crate::guild::ReviveChatSettings;
use crate::services::config_store::ConfigStore;
use crate::shapes::ShapesClient;
use chrono::Utc;
use dashmap::DashMap;
use rand::seq::IndexedRandom;
use serenity::all::{ChannelId, CreateAllowedMentions, CreateMessage, RoleId};
use serenity::http::Http;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const MIN_INTERVAL: Duration = Duration::from_secs(60);
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const REVIVE_PROMPT: &str = "Chat's dead. Say one short, natural line (in your tone) that \
could spark someone to reply, not like a mod or QOTD.";

const FALLBACK_LINES: &[&str] = &[
    "What's everyone up to today? Let's get this chat moving!",
    "Anyone have any interesting stories to share?",
    "What's the most exciting thing that happened to you this week?",
    "If you could have dinner with anyone, dead or alive, who would it be and why?",
    "What's your go-to comfort food when you're having a rough day?",
    "Share something you learned recently that surprised you!",
    "What's a skill you'd love to master if you had unlimited time?",
    "Describe your perfect weekend in three words.",
    "What's the best advice you've ever received?",
    "If you could travel anywhere right now, where would you go?",
    "What's something you're looking forward to this month?",
    "Share a random fact that most people don't know!",
    "What's your favorite way to unwind after a long day?",
    "If you could have any superpower for just one day, what would it be?",
    "What's the most beautiful place you've ever visited?",
    "Share something that always makes you smile!",
    "What's a hobby you've always wanted to try?",
    "Describe the last thing that made you laugh out loud.",
    "What's your favorite season and why?",
    "If you could master any language instantly, which would you choose?",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntervalError {
    #[error("Invalid interval '{0}'. Use a duration like `30m`, `2h` or `1h 30m`.")]
    Unparseable(String),
    #[error("Interval must be between 1 minute and 24 hours.")]
    OutOfRange,
}

/// Parse a `/revivechat` interval such as `45m` or `2h`, bounded to 1m..=24h.
pub fn parse_interval(raw: &str) -> Result<Duration, IntervalError> {
    let parsed = humantime::parse_duration(raw.trim())
        .map_err(|_| IntervalError::Unparseable(raw.trim().to_string()))?;
    if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&parsed) {
        return Err(IntervalError::OutOfRange);
    }
    Ok(parsed)
}

pub fn format_interval(secs: u64) -> String {
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

fn fallback_line() -> &'static str {
    FALLBACK_LINES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(FALLBACK_LINES[0])
}

fn revive_message(line: &str, role_id: u64) -> String {
    format!("{} <@&{}>", line, role_id)
}

/// Shared state every revive task needs.
struct ReviveDeps {
    http: Arc<Http>,
    store: Arc<ConfigStore>,
    shapes: Arc<ShapesClient>,
    activity: ChannelActivity,
    silence_override: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
struct ReviveJob {
    guild_id: u64,
    channel_id: u64,
    role_id: u64,
    interval: Duration,
}

impl ReviveDeps {
    async fn run(self: Arc<Self>, job: ReviveJob, first_at: i64) {
        let mut next_at = first_at;
        loop {
            let wait = (next_at - Utc::now().timestamp()).max(0) as u64;
            tokio::time::sleep(Duration::from_secs(wait)).await;

            if let Err(e) = self.fire(&job).await {
                warn!("Revive chat delivery failed for guild {}: {}", job.guild_id, e);
            }

            next_at = Utc::now().timestamp() + job.interval.as_secs() as i64;
            let persisted = self.store.update(job.guild_id, |cfg| {
                if cfg.revive_chat.enabled {
                    cfg.revive_chat.next_send_at = Some(next_at);
                }
            })
            .await;
            if let Err(e) = persisted {
                error!("Failed to persist next revive time for guild {}: {}", job.guild_id, e);
            }
        }
    }

    async fn fire(&self, job: &ReviveJob) -> Result<(), serenity::Error> {
        let window = self.silence_override.unwrap_or(job.interval);
        if !self.activity.is_quiet(job.channel_id, window, Instant::now()) {
            debug!(
                "Channel {} is active, skipping revive for guild {}",
                job.channel_id, job.guild_id
            );
            return Ok(());
        }

        let line = match self.shapes.generate_line(REVIVE_PROMPT).await {
            Ok(line) => line,
            Err(e) => {
                warn!("Revive line generation failed, using fallback: {}", e);
                fallback_line().to_string()
            }
        };

        let builder = CreateMessage::new()
            .content(revive_message(&line, job.role_id))
            .allowed_mentions(CreateAllowedMentions::new().roles(vec![RoleId::new(job.role_id)]));
        ChannelId::new(job.channel_id)
            .send_message(&self.http, builder)
            .await?;

        info!(
            "Sent revive message to channel {} in guild {}",
            job.channel_id, job.guild_id
        );
        Ok(())
    }
}

/// One cancellable revive task per guild.
pub struct ReviveScheduler {
    deps: Arc<ReviveDeps>,
    tasks: DashMap<u64, JoinHandle<()>>,
}

impl ReviveScheduler {
    pub fn new(
        http: Arc<Http>,
        store: Arc<ConfigStore>,
        shapes: Arc<ShapesClient>,
        activity: ChannelActivity,
        silence_override: Option<Duration>,
    ) -> Self {
        Self {
            deps: Arc::new(ReviveDeps {
                http,
                store,
                shapes,
                activity,
                silence_override,
            }),
            tasks: DashMap::new(),
        }
    }

    /// Start (or restart) the guild's timer. Returns false when the settings
    /// are incomplete or disabled.
    pub fn start(&self, guild_id: u64, settings: &ReviveChatSettings) -> bool {
        let (Some(channel_id), Some(role_id)) = (settings.channel_id, settings.role_id) else {
            return false;
        };
        if !settings.enabled {
            return false;
        }

        let job = ReviveJob {
            guild_id,
            channel_id,
            role_id,
            interval: Duration::from_secs(settings.interval_secs),
        };
        let first_at = settings
            .next_send_at
            .unwrap_or_else(|| Utc::now().timestamp() + settings.interval_secs as i64);

        let handle = tokio::spawn(self.deps.clone().run(job, first_at));
        if let Some(previous) = self.tasks.insert(guild_id, handle) {
            previous.abort();
        }
        info!(
            "Revive chat scheduled for guild {} every {}",
            guild_id,
            format_interval(settings.interval_secs)
        );
        true
    }

    /// Cancel the guild's timer; other guilds are untouched.
    pub fn stop(&self, guild_id: u64) -> bool {
        match self.tasks.remove(&guild_id) {
            Some((_, handle)) => {
                handle.abort();
                info!("Revive chat stopped for guild {}", guild_id);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, guild_id: u64) -> bool {
        self.tasks
            .get(&guild_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Restart timers for every guild that had revive chat enabled.
    pub async fn resume_all(&self) -> anyhow::Result<usize> {
        let mut resumed = 0;
        for (guild_id, cfg) in self.deps.store.persisted_guilds().await? {
            if self.start(guild_id, &cfg.revive_chat) {
                resumed += 1;
            }
        }
        Ok(resumed)
    }
}

impl Drop for ReviveScheduler {
    fn drop(&mut self) {
        for task in self.tasks.iter() {
            task.value().abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::db::Database;

    fn scheduler() -> (ReviveScheduler, Arc<ConfigStore>) {
        let config = test_config();
        let db = Database::new(&config).unwrap();
        db.execute_init().unwrap();
        let store = Arc::new(ConfigStore::new(db));
        let shapes = Arc::new(ShapesClient::new(&config, reqwest::Client::new()));
        let scheduler = ReviveScheduler::new(
            Arc::new(Http::new("test")),
            store.clone(),
            shapes,
            ChannelActivity::new(16),
            None,
        );
        (scheduler, store)
    }

    fn enabled(channel: u64) -> ReviveChatSettings {
        ReviveChatSettings {
            enabled: true,
            channel_id: Some(channel),
            role_id: Some(5),
            interval_secs: 3600,
            next_send_at: Some(Utc::now().timestamp() + 3600),
        }
    }

    #[test]
    fn test_parse_interval_bounds() {
        assert_eq!(parse_interval("30m"), Ok(Duration::from_secs(1800)));
        assert_eq!(parse_interval(" 2h "), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_interval("1m"), Ok(MIN_INTERVAL));
        assert_eq!(parse_interval("24h"), Ok(MAX_INTERVAL));
        assert_eq!(parse_interval("30s"), Err(IntervalError::OutOfRange));
        assert_eq!(parse_interval("25h"), Err(IntervalError::OutOfRange));
        assert!(matches!(
            parse_interval("soon"),
            Err(IntervalError::Unparseable(_))
        ));
    }

    #[test]
    fn test_revive_message_and_fallback() {
        assert_eq!(revive_message("Anyone here?", 42), "Anyone here? <@&42>");
        assert!(FALLBACK_LINES.contains(&fallback_line()));
        assert_eq!(format_interval(5400), "1h 30m");
    }

    #[tokio::test]
    async fn test_per_guild_start_and_stop() {
        let (scheduler, _store) = scheduler();
        assert!(scheduler.start(1, &enabled(10)));
        assert!(scheduler.start(2, &enabled(20)));
        assert!(scheduler.is_running(1));

        assert!(scheduler.stop(1));
        assert!(!scheduler.stop(1));
        assert!(!scheduler.is_running(1));
        assert!(scheduler.is_running(2));

        // Restarting replaces the previous task
        assert!(scheduler.start(2, &enabled(21)));
        assert_eq!(scheduler.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_settings_do_not_start() {
        let (scheduler, _store) = scheduler();
        let mut settings = enabled(10);
        settings.role_id = None;
        assert!(!scheduler.start(1, &settings));

        let mut settings = enabled(10);
        settings.enabled = false;
        assert!(!scheduler.start(1, &settings));
        assert!(!scheduler.is_running(1));
    }

    #[tokio::test]
    async fn test_resume_all_restarts_enabled_guilds() {
        let (scheduler, store) = scheduler();
        store
            .update(1, |cfg| cfg.enable_revive_chat(10, 5, 3600, Utc::now().timestamp() + 60))
            .await
            .unwrap();
        store
            .update(2, |cfg| {
                cfg.enable_revive_chat(20, 5, 3600, 0);
                cfg.disable_revive_chat();
            })
            .await
            .unwrap();

        assert_eq!(scheduler.resume_all().await.unwrap(), 1);
        assert!(scheduler.is_running(1));
        assert!(!scheduler.is_running(2));
    }
}
