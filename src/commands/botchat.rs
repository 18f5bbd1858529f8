use super::{reply_ephemeral, require};
use crate::guild::CommandName;
use crate::{Context, Error};
use tracing::info;

/// Let the bot answer other bots in this server
#[poise::command(slash_command, guild_only)]
pub async fn botchat(
    ctx: Context<'_>,
    #[description = "Allow conversations with other bots"] enabled: bool,
) -> Result<(), Error> {
    let guild_id = require(ctx, CommandName::Botchat).await?;
    ctx.data()
        .store
        .update(guild_id.get(), |cfg| cfg.bot_chat_enabled = enabled)
        .await?;
    info!("Bot chat set to {} in guild {}", enabled, guild_id);

    let text = if enabled {
        "✅ Bot chat enabled. I'll respond to other bots (at most 20 replies per minute per channel)."
    } else {
        "✅ Bot chat disabled. I'll ignore messages from other bots."
    };
    reply_ephemeral(ctx, text).await
}
