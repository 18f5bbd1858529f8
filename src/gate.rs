//! Decides whether an incoming message gets an AI answer.
//!
//! Everything here is pure: the handler collects the facts about a message,
//! takes a snapshot of the guild config and asks [`decide`].

use crate::guild::GuildConfig;
use crate::trigger::find_trigger;

/// The facts about one Discord message that matter for the decision.
#[derive(Debug, Clone, Copy)]
pub struct MessageEvent<'a> {
    pub author_id: u64,
    pub author_is_bot: bool,
    pub channel_id: u64,
    /// `None` for direct messages
    pub guild_id: Option<u64>,
    pub content: &'a str,
    pub mentions_bot: bool,
    pub replies_to_bot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Mention,
    ReplyContinuation,
    TriggerWord,
    ActivatedChannel,
    DirectMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Ignore,
    Respond(ResponseMode),
}

impl Decision {
    pub fn mode(self) -> Option<ResponseMode> {
        match self {
            Decision::Ignore => None,
            Decision::Respond(mode) => Some(mode),
        }
    }
}

/// Apply the gate rules in order; the first one that matches wins.
///
/// `guild` is the snapshot for `event.guild_id` (ignored for DMs) and
/// `global_triggers` are the `TRIGGER_WORDS` from the environment.
pub fn decide(
    event: &MessageEvent<'_>,
    guild: Option<&GuildConfig>,
    global_triggers: &[String],
) -> Decision {
    let guild = event.guild_id.and(guild);

    if let Some(cfg) = guild {
        if cfg.is_user_blocked(event.author_id) {
            return Decision::Ignore;
        }
        if cfg.blacklist.contains(&event.channel_id) {
            return Decision::Ignore;
        }
        if !cfg.whitelist.is_empty() && !cfg.whitelist.contains(&event.channel_id) {
            return Decision::Ignore;
        }
    }

    if event.author_is_bot {
        let bot_chat = guild.is_some_and(|cfg| cfg.bot_chat_enabled);
        if event.guild_id.is_none() || !bot_chat {
            return Decision::Ignore;
        }
    }

    if event.guild_id.is_none() {
        return Decision::Respond(ResponseMode::DirectMessage);
    }

    if event.mentions_bot {
        return Decision::Respond(ResponseMode::Mention);
    }
    if event.replies_to_bot {
        return Decision::Respond(ResponseMode::ReplyContinuation);
    }

    if guild.is_some_and(|cfg| cfg.is_channel_activated(event.channel_id)) {
        return Decision::Respond(ResponseMode::ActivatedChannel);
    }

    let guild_words = guild
        .into_iter()
        .flat_map(|cfg| cfg.trigger_words.iter().map(String::as_str));
    let words = global_triggers.iter().map(String::as_str).chain(guild_words);
    if find_trigger(event.content, words).is_some() {
        return Decision::Respond(ResponseMode::TriggerWord);
    }

    Decision::Ignore
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: u64 = 1;
    const CHANNEL: u64 = 10;
    const AUTHOR: u64 = 100;

    fn event(content: &str) -> MessageEvent<'_> {
        MessageEvent {
            author_id: AUTHOR,
            author_is_bot: false,
            channel_id: CHANNEL,
            guild_id: Some(GUILD),
            content,
            mentions_bot: false,
            replies_to_bot: false,
        }
    }

    #[test]
    fn test_plain_message_is_ignored() {
        let cfg = GuildConfig::default();
        assert_eq!(decide(&event("hello"), Some(&cfg), &[]), Decision::Ignore);
    }

    #[test]
    fn test_blocked_author_never_gets_a_response() {
        let mut cfg = GuildConfig::default();
        cfg.block_user(AUTHOR);
        cfg.set_channel_activated(CHANNEL, true);
        cfg.add_trigger_word("help").unwrap();

        let mut ev = event("help");
        ev.mentions_bot = true;
        ev.replies_to_bot = true;
        assert_eq!(decide(&ev, Some(&cfg), &["help".into()]), Decision::Ignore);
    }

    #[test]
    fn test_whitelist_exclusion_beats_mention() {
        let mut cfg = GuildConfig::default();
        cfg.add_to_whitelist(CHANNEL + 1);

        let mut ev = event("hi");
        ev.mentions_bot = true;
        assert_eq!(decide(&ev, Some(&cfg), &[]), Decision::Ignore);

        ev.channel_id = CHANNEL + 1;
        assert_eq!(
            decide(&ev, Some(&cfg), &[]),
            Decision::Respond(ResponseMode::Mention)
        );
    }

    #[test]
    fn test_blacklisted_channel_is_ignored() {
        let mut cfg = GuildConfig::default();
        cfg.add_to_blacklist(CHANNEL);
        let mut ev = event("hi");
        ev.mentions_bot = true;
        assert_eq!(decide(&ev, Some(&cfg), &[]), Decision::Ignore);
    }

    #[test]
    fn test_trigger_word_from_guild_or_env() {
        let mut cfg = GuildConfig::default();
        cfg.add_trigger_word("help").unwrap();
        assert_eq!(
            decide(&event("I need help please"), Some(&cfg), &[]),
            Decision::Respond(ResponseMode::TriggerWord)
        );

        let cfg = GuildConfig::default();
        assert_eq!(
            decide(&event("Hey SHAPE"), Some(&cfg), &["shape".into()]),
            Decision::Respond(ResponseMode::TriggerWord)
        );
        assert_eq!(
            decide(&event("shapeshifter"), Some(&cfg), &["shape".into()]),
            Decision::Ignore
        );
    }

    #[test]
    fn test_rule_precedence() {
        let mut cfg = GuildConfig::default();
        cfg.set_channel_activated(CHANNEL, true);

        let mut ev = event("anything");
        assert_eq!(
            decide(&ev, Some(&cfg), &[]),
            Decision::Respond(ResponseMode::ActivatedChannel)
        );

        ev.replies_to_bot = true;
        assert_eq!(
            decide(&ev, Some(&cfg), &[]),
            Decision::Respond(ResponseMode::ReplyContinuation)
        );

        ev.mentions_bot = true;
        assert_eq!(
            decide(&ev, Some(&cfg), &[]),
            Decision::Respond(ResponseMode::Mention)
        );
    }

    #[test]
    fn test_direct_messages() {
        let mut ev = event("hi");
        ev.guild_id = None;
        assert_eq!(
            decide(&ev, None, &[]),
            Decision::Respond(ResponseMode::DirectMessage)
        );

        // A guild snapshot passed by mistake must not apply to a DM
        let mut cfg = GuildConfig::default();
        cfg.block_user(AUTHOR);
        assert_eq!(
            decide(&ev, Some(&cfg), &[]),
            Decision::Respond(ResponseMode::DirectMessage)
        );

        ev.author_is_bot = true;
        assert_eq!(decide(&ev, None, &[]), Decision::Ignore);
    }

    #[test]
    fn test_bot_authors_need_bot_chat() {
        let mut cfg = GuildConfig::default();
        let mut ev = event("hi");
        ev.author_is_bot = true;
        ev.mentions_bot = true;
        assert_eq!(decide(&ev, Some(&cfg), &[]), Decision::Ignore);

        cfg.bot_chat_enabled = true;
        assert_eq!(
            decide(&ev, Some(&cfg), &[]),
            Decision::Respond(ResponseMode::Mention)
        );

        // Same rules as humans once allowed
        ev.mentions_bot = false;
        assert_eq!(decide(&ev, Some(&cfg), &[]), Decision::Ignore);
        cfg.block_user(AUTHOR);
        ev.mentions_bot = true;
        assert_eq!(decide(&ev, Some(&cfg), &[]), Decision::Ignore);
    }
}
