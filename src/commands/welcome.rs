use super::{reply_ephemeral, require};
use crate::guild::CommandName;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum WelcomeStatus {
    #[name = "enable"]
    Enable,
    #[name = "disable"]
    Disable,
}

/// Greet new members in a channel
#[poise::command(slash_command, guild_only)]
pub async fn welcome(
    ctx: Context<'_>,
    #[description = "Channel for welcome messages"]
    #[channel_types("Text", "News")]
    channel: serenity::GuildChannel,
    #[description = "Turn welcomes on or off"] status: WelcomeStatus,
) -> Result<(), Error> {
    let guild_id = require(ctx, CommandName::Welcome).await?;
    let enabled = status == WelcomeStatus::Enable;

    ctx.data()
        .store
        .update(guild_id.get(), |cfg| cfg.set_welcome(enabled, channel.id.get()))
        .await?;
    info!(
        "Welcome messages {} in guild {} (channel {})",
        if enabled { "enabled" } else { "disabled" },
        guild_id,
        channel.id
    );

    let text = if enabled {
        format!("✅ I'll welcome new members in <#{}>.", channel.id)
    } else {
        "✅ Welcome messages disabled.".to_string()
    };
    reply_ephemeral(ctx, text).await
}
