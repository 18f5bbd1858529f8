use crate::error::ApiError;
use dashmap::DashMap;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const BOT_REPLY_LIMIT: usize = 20;
const BOT_REPLY_WINDOW: Duration = Duration::from_secs(60);
const BOT_REPLY_MIN_GAP: Duration = Duration::from_secs(10);
const BOT_REPLY_DELAY_SECS: (u64, u64) = (10, 30);
/// Latest-message records older than this are forgotten.
const BOT_MESSAGE_TTL: Duration = Duration::from_secs(10 * 60);

/// Remembers Shapes API rate-limit resets so later calls fail fast.
#[derive(Default)]
pub struct ApiRateLimits {
    resets: DashMap<String, Instant>,
}

impl ApiRateLimits {
    pub fn key_for(user_id: Option<u64>, has_user_auth: bool) -> String {
        match user_id {
            Some(id) if has_user_auth => format!("user_{}", id),
            _ => "default".to_string(),
        }
    }

    /// `Err(RateLimited)` while a remembered reset is still in the future.
    pub fn check(&self, key: &str, now: Instant) -> Result<(), ApiError> {
        let Some(reset) = self.resets.get(key).map(|r| *r) else {
            return Ok(());
        };
        if reset <= now {
            self.resets.remove(key);
            return Ok(());
        }
        Err(ApiError::RateLimited {
            retry_after: Some(reset - now),
        })
    }

    /// Remember a reset `retry_after` from `now`. A wait past what `Instant`
    /// can represent is dropped rather than stored.
    pub fn record(&self, key: &str, retry_after: Duration, now: Instant) {
        let Some(reset) = now.checked_add(retry_after) else {
            warn!("Ignoring unrepresentable rate limit for {} ({:?})", key, retry_after);
            return;
        };
        debug!("Rate limit recorded for {} ({:?})", key, retry_after);
        self.resets.insert(key.to_string(), reset);
    }
}

#[derive(Default)]
struct ChannelBotState {
    replies: VecDeque<Instant>,
    /// Latest message id seen per bot author, with when it arrived
    latest: HashMap<u64, (u64, Instant)>,
}

impl ChannelBotState {
    fn prune(&mut self, now: Instant) {
        while self
            .replies
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= BOT_REPLY_WINDOW)
        {
            self.replies.pop_front();
        }
        self.latest
            .retain(|_, (_, seen)| now.saturating_duration_since(*seen) < BOT_MESSAGE_TTL);
    }

    fn is_idle(&self) -> bool {
        self.replies.is_empty() && self.latest.is_empty()
    }
}

/// Bounds how often the bot answers other bots in a channel.
///
/// A reply is only counted once it has been sent, so messages superseded
/// during the reply delay do not use up the budget.
#[derive(Default)]
pub struct BotChatThrottle {
    channels: DashMap<u64, ChannelBotState>,
}

impl BotChatThrottle {
    /// Record `message_id` as the newest message from `bot_id` in the channel,
    /// and drop state for channels that have gone quiet.
    pub fn note_message(&self, channel_id: u64, bot_id: u64, message_id: u64, now: Instant) {
        self.channels
            .entry(channel_id)
            .or_default()
            .latest
            .insert(bot_id, (message_id, now));
        self.channels.retain(|_, state| {
            state.prune(now);
            !state.is_idle()
        });
    }

    /// False once a newer message from the same bot has arrived.
    pub fn is_latest(&self, channel_id: u64, bot_id: u64, message_id: u64) -> bool {
        self.channels
            .get(&channel_id)
            .and_then(|state| state.latest.get(&bot_id).map(|(id, _)| *id))
            .map_or(true, |latest| latest == message_id)
    }

    /// Whether a reply may be sent now: at most 20 per minute, 10 seconds apart.
    pub fn allows_reply(&self, channel_id: u64, now: Instant) -> bool {
        let Some(mut state) = self.channels.get_mut(&channel_id) else {
            return true;
        };
        state.prune(now);

        if state.replies.len() >= BOT_REPLY_LIMIT {
            return false;
        }
        !state
            .replies
            .back()
            .is_some_and(|last| now.saturating_duration_since(*last) < BOT_REPLY_MIN_GAP)
    }

    /// Count a reply that was actually sent.
    pub fn record_reply(&self, channel_id: u64, now: Instant) {
        self.channels
            .entry(channel_id)
            .or_default()
            .replies
            .push_back(now);
    }

    /// Random pause before answering a bot, so exchanges read less mechanical.
    pub fn reply_delay() -> Duration {
        let (min, max) = BOT_REPLY_DELAY_SECS;
        Duration::from_secs(rand::rng().random_range(min..=max))
    }
}
