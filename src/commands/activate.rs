use super::{reply_ephemeral, require};
use crate::guild::CommandName;
use crate::{Context, Error};
use tracing::info;

/// Respond to every message in this channel
#[poise::command(slash_command, guild_only)]
pub async fn activate(
    ctx: Context<'_>,
    #[description = "Turn automatic responses on or off"] enabled: bool,
) -> Result<(), Error> {
    let guild_id = require(ctx, CommandName::Activate).await?;
    let channel_id = ctx.channel_id();

    let changed = ctx
        .data()
        .store
        .update(guild_id.get(), |cfg| cfg.set_channel_activated(channel_id.get(), enabled))
        .await?;
    if changed {
        info!(
            "Channel {} in guild {} activated={} by {}",
            channel_id,
            guild_id,
            enabled,
            ctx.author().id
        );
    }

    let text = match (enabled, changed) {
        (true, true) => format!("✅ I'll now respond to every message in <#{}>.", channel_id),
        (true, false) => format!("ℹ️ <#{}> is already activated.", channel_id),
        (false, true) => format!(
            "✅ Deactivated <#{}>. I'll only respond to mentions, replies and trigger words.",
            channel_id
        ),
        (false, false) => format!("ℹ️ <#{}> was not activated.", channel_id),
    };
    reply_ephemeral(ctx, text).await
}
