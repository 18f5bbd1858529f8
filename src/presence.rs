use crate::config::{ActivityKind, Config, PresenceStatus};
use poise::serenity_prelude as serenity;
use serenity::{ActivityData, ActivityType, OnlineStatus};

pub fn online_status(status: PresenceStatus) -> OnlineStatus {
    match status {
        PresenceStatus::Online => OnlineStatus::Online,
        PresenceStatus::Idle => OnlineStatus::Idle,
        PresenceStatus::DoNotDisturb => OnlineStatus::DoNotDisturb,
        PresenceStatus::Invisible => OnlineStatus::Invisible,
    }
}

/// The activity from `ACTIVITY_TYPE`/`ACTIVITY_MESSAGE`; none without a message.
pub fn activity(config: &Config) -> Option<ActivityData> {
    let message = config.activity_message.as_deref()?;
    match config.activity_type {
        ActivityKind::None => None,
        ActivityKind::Playing => Some(ActivityData::playing(message)),
        ActivityKind::Listening => Some(ActivityData::listening(message)),
        ActivityKind::Watching => Some(ActivityData::watching(message)),
        ActivityKind::Competing => Some(ActivityData::competing(message)),
        ActivityKind::Custom => Some(ActivityData::custom(message)),
        // Streaming needs a URL to render; without one Discord shows the name only
        ActivityKind::Streaming => {
            let mut data = ActivityData::playing(message);
            data.kind = ActivityType::Streaming;
            Some(data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_activity_requires_message() {
        let mut config = test_config();
        config.activity_type = ActivityKind::Watching;
        assert!(activity(&config).is_none());

        config.activity_message = Some("the chat".to_string());
        let data = activity(&config).unwrap();
        assert_eq!(data.kind, ActivityType::Watching);
        assert_eq!(data.name, "the chat");

        config.activity_type = ActivityKind::None;
        assert!(activity(&config).is_none());
    }

    #[test]
    fn test_streaming_kind() {
        let mut config = test_config();
        config.activity_type = ActivityKind::Streaming;
        config.activity_message = Some("live".to_string());
        assert_eq!(activity(&config).unwrap().kind, ActivityType::Streaming);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            online_status(PresenceStatus::DoNotDisturb),
            OnlineStatus::DoNotDisturb
        );
        assert_eq!(online_status(PresenceStatus::Online), OnlineStatus::Online);
    }
}
