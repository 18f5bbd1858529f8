use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const MAX_TRIGGER_WORD_CHARS: usize = 100;
pub const DEFAULT_REVIVE_INTERVAL_SECS: u64 = 3600;

/// Commands whose access can be granted to extra roles through `/permission`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandName {
    Activate,
    Block,
    Blacklist,
    Whitelist,
    Trigger,
    Revivechat,
    Welcome,
    Botchat,
    Say,
    // Shapes API `!` commands
    Imagine,
    Web,
    Wack,
    Reset,
    Sleep,
    Info,
    Dashboard,
    Help,
}

impl CommandName {
    pub const ALL: [CommandName; 17] = [
        CommandName::Activate,
        CommandName::Block,
        CommandName::Blacklist,
        CommandName::Whitelist,
        CommandName::Trigger,
        CommandName::Revivechat,
        CommandName::Welcome,
        CommandName::Botchat,
        CommandName::Say,
        CommandName::Imagine,
        CommandName::Web,
        CommandName::Wack,
        CommandName::Reset,
        CommandName::Sleep,
        CommandName::Info,
        CommandName::Dashboard,
        CommandName::Help,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::Activate => "activate",
            CommandName::Block => "block",
            CommandName::Blacklist => "blacklist",
            CommandName::Whitelist => "whitelist",
            CommandName::Trigger => "trigger",
            CommandName::Revivechat => "revivechat",
            CommandName::Welcome => "welcome",
            CommandName::Botchat => "botchat",
            CommandName::Say => "say",
            CommandName::Imagine => "imagine",
            CommandName::Web => "web",
            CommandName::Wack => "wack",
            CommandName::Reset => "reset",
            CommandName::Sleep => "sleep",
            CommandName::Info => "info",
            CommandName::Dashboard => "dashboard",
            CommandName::Help => "help",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().trim_start_matches(['/', '!']).to_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Handled by the Shapes API itself rather than by a slash command.
    pub fn is_shape_command(self) -> bool {
        matches!(
            self,
            CommandName::Imagine
                | CommandName::Web
                | CommandName::Wack
                | CommandName::Reset
                | CommandName::Sleep
                | CommandName::Info
                | CommandName::Dashboard
                | CommandName::Help
        )
    }

    /// How users invoke it: `/activate` or `!imagine`.
    pub fn invocation(self) -> String {
        if self.is_shape_command() {
            format!("!{}", self.as_str())
        } else {
            format!("/{}", self.as_str())
        }
    }

    /// Detect a shape command at the start of a message, e.g. `!imagine a cat`.
    pub fn from_message(content: &str) -> Option<Self> {
        let first = content.split_whitespace().next()?;
        let name = first.strip_prefix('!')?;
        Self::parse(name).filter(|c| c.is_shape_command())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviveChatSettings {
    pub enabled: bool,
    pub channel_id: Option<u64>,
    pub role_id: Option<u64>,
    pub interval_secs: u64,
    /// Unix seconds of the next scheduled firing
    pub next_send_at: Option<i64>,
}

impl Default for ReviveChatSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_id: None,
            role_id: None,
            interval_secs: DEFAULT_REVIVE_INTERVAL_SECS,
            next_send_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WelcomeSettings {
    pub enabled: bool,
    pub channel_id: Option<u64>,
}

/// Everything the bot remembers about one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildConfig {
    pub activated_channels: BTreeSet<u64>,
    pub blacklist: BTreeSet<u64>,
    pub whitelist: BTreeSet<u64>,
    pub trigger_words: BTreeSet<String>,
    pub blocked_users: BTreeSet<u64>,
    pub command_permissions: BTreeMap<CommandName, BTreeSet<u64>>,
    pub bot_chat_enabled: bool,
    pub revive_chat: ReviveChatSettings,
    pub welcome: WelcomeSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelList {
    Blacklist,
    Whitelist,
}

impl ChannelList {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelList::Blacklist => "blacklist",
            ChannelList::Whitelist => "whitelist",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            ChannelList::Blacklist => ChannelList::Whitelist,
            ChannelList::Whitelist => ChannelList::Blacklist,
        }
    }
}

impl GuildConfig {
    /// Returns true when the set changed.
    pub fn set_channel_activated(&mut self, channel_id: u64, enabled: bool) -> bool {
        if enabled {
            self.activated_channels.insert(channel_id)
        } else {
            self.activated_channels.remove(&channel_id)
        }
    }

    pub fn is_channel_activated(&self, channel_id: u64) -> bool {
        self.activated_channels.contains(&channel_id)
    }

    pub fn channel_list(&self, list: ChannelList) -> &BTreeSet<u64> {
        match list {
            ChannelList::Blacklist => &self.blacklist,
            ChannelList::Whitelist => &self.whitelist,
        }
    }

    fn channel_list_mut(&mut self, list: ChannelList) -> &mut BTreeSet<u64> {
        match list {
            ChannelList::Blacklist => &mut self.blacklist,
            ChannelList::Whitelist => &mut self.whitelist,
        }
    }

    /// Adding to one list switches the guild to that mode and clears the other.
    pub fn add_to_channel_list(&mut self, list: ChannelList, channel_id: u64) -> bool {
        self.channel_list_mut(list.opposite()).clear();
        self.channel_list_mut(list).insert(channel_id)
    }

    pub fn remove_from_channel_list(&mut self, list: ChannelList, channel_id: u64) -> bool {
        self.channel_list_mut(list).remove(&channel_id)
    }

    pub fn add_to_blacklist(&mut self, channel_id: u64) -> bool {
        self.add_to_channel_list(ChannelList::Blacklist, channel_id)
    }

    pub fn add_to_whitelist(&mut self, channel_id: u64) -> bool {
        self.add_to_channel_list(ChannelList::Whitelist, channel_id)
    }

    pub fn add_trigger_word(&mut self, word: &str) -> Result<bool, TriggerWordError> {
        let word = normalize_trigger_word(word)?;
        Ok(self.trigger_words.insert(word))
    }

    pub fn remove_trigger_word(&mut self, word: &str) -> Result<bool, TriggerWordError> {
        let word = normalize_trigger_word(word)?;
        Ok(self.trigger_words.remove(&word))
    }

    pub fn block_user(&mut self, user_id: u64) -> bool {
        self.blocked_users.insert(user_id)
    }

    pub fn unblock_user(&mut self, user_id: u64) -> bool {
        self.blocked_users.remove(&user_id)
    }

    pub fn is_user_blocked(&self, user_id: u64) -> bool {
        self.blocked_users.contains(&user_id)
    }

    pub fn grant_role(&mut self, command: CommandName, role_id: u64) -> bool {
        self.command_permissions
            .entry(command)
            .or_default()
            .insert(role_id)
    }

    pub fn revoke_role(&mut self, command: CommandName, role_id: u64) -> bool {
        let Some(roles) = self.command_permissions.get_mut(&command) else {
            return false;
        };
        let removed = roles.remove(&role_id);
        if roles.is_empty() {
            self.command_permissions.remove(&command);
        }
        removed
    }

    pub fn granted_roles(&self, command: CommandName) -> Option<&BTreeSet<u64>> {
        self.command_permissions
            .get(&command)
            .filter(|roles| !roles.is_empty())
    }

    pub fn enable_revive_chat(
        &mut self,
        channel_id: u64,
        role_id: u64,
        interval_secs: u64,
        next_send_at: i64,
    ) {
        self.revive_chat = ReviveChatSettings {
            enabled: true,
            channel_id: Some(channel_id),
            role_id: Some(role_id),
            interval_secs,
            next_send_at: Some(next_send_at),
        };
    }

    /// Keeps channel/role/interval so `status` can still show them.
    pub fn disable_revive_chat(&mut self) -> bool {
        let was_enabled = self.revive_chat.enabled;
        self.revive_chat.enabled = false;
        self.revive_chat.next_send_at = None;
        was_enabled
    }

    pub fn set_welcome(&mut self, enabled: bool, channel_id: u64) {
        self.welcome = WelcomeSettings {
            enabled,
            channel_id: enabled.then_some(channel_id),
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TriggerWordError {
    #[error("Trigger word cannot be empty.")]
    Empty,
    #[error("Trigger word cannot be longer than 100 characters.")]
    TooLong,
}

pub fn normalize_trigger_word(word: &str) -> Result<String, TriggerWordError> {
    let word = word.trim().to_lowercase();
    if word.is_empty() {
        return Err(TriggerWordError::Empty);
    }
    if word.chars().count() > MAX_TRIGGER_WORD_CHARS {
        return Err(TriggerWordError::TooLong);
    }
    Ok(word)
}
