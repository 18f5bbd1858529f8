use super::{reply_ephemeral, require};
use crate::config::DISCORD_MESSAGE_LIMIT;
use crate::error::BotError;
use crate::guild::CommandName;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use tracing::{info, warn};

fn validate_say(message: &str) -> Result<&str, String> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err("❌ Message cannot be empty.".to_string());
    }
    if trimmed.chars().count() > DISCORD_MESSAGE_LIMIT {
        return Err(format!(
            "❌ Message is too long (max {} characters).",
            DISCORD_MESSAGE_LIMIT
        ));
    }
    Ok(trimmed)
}

/// Make the bot send a message
#[poise::command(slash_command, guild_only)]
pub async fn say(
    ctx: Context<'_>,
    #[description = "What to say"] message: String,
    #[description = "Where to send it (defaults to this channel)"]
    #[channel_types("Text", "News")]
    channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    require(ctx, CommandName::Say).await?;
    let content = match validate_say(&message) {
        Ok(content) => content,
        Err(reason) => return reply_ephemeral(ctx, reason).await,
    };

    let channel_id = channel.map(|c| c.id).unwrap_or_else(|| ctx.channel_id());
    let sent = channel_id
        .send_message(
            ctx.http(),
            serenity::CreateMessage::new()
                .content(content)
                .allowed_mentions(serenity::CreateAllowedMentions::new()),
        )
        .await
        .map_err(BotError::Delivery);

    match sent {
        Ok(_) => {
            info!("/say by {} into channel {}", ctx.author().id, channel_id);
            reply_ephemeral(ctx, format!("✅ Message sent to <#{}>.", channel_id)).await
        }
        Err(e) => {
            warn!("/say into channel {} failed: {}", channel_id, e);
            reply_ephemeral(
                ctx,
                format!("❌ I couldn't send a message in <#{}>. Check my permissions there.", channel_id),
            )
            .await
        }
    }
}
