pub mod activity;
pub mod commands;
pub mod config;
pub mod db;
pub mod discord_text;
pub mod error;
pub mod gate;
pub mod guild;
pub mod handler;
pub mod permissions;
pub mod presence;
pub mod reply;
pub mod revive;
pub mod services;
pub mod shapes;
pub mod trigger;
pub mod welcome;

use std::sync::Arc;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub store: Arc<services::config_store::ConfigStore>,
    pub shapes: Arc<shapes::ShapesClient>,
    pub auth: services::auth::UserAuthService,
    pub bot_throttle: services::rate_limit::BotChatThrottle,
    /// Last human message per channel, read by revive timers
    pub activity: activity::ChannelActivity,
    pub revive: revive::ReviveScheduler,
    /// Bot's own user ID for mention handling
    pub bot_id: u64,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
