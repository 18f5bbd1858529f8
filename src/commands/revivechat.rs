use super::{reply_ephemeral, require};
use crate::guild::{CommandName, ReviveChatSettings};
use crate::revive::{format_interval, parse_interval};
use crate::{Context, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum ReviveAction {
    #[name = "enable"]
    Enable,
    #[name = "disable"]
    Disable,
    #[name = "status"]
    Status,
}

fn render_status(settings: &ReviveChatSettings, running: bool) -> String {
    let state = match (settings.enabled, running) {
        (true, true) => "✅ Enabled",
        (true, false) => "⚠️ Enabled (timer not running)",
        (false, _) => "❌ Disabled",
    };
    let channel = settings
        .channel_id
        .map(|c| format!("<#{}>", c))
        .unwrap_or_else(|| "not set".to_string());
    let role = settings
        .role_id
        .map(|r| format!("<@&{}>", r))
        .unwrap_or_else(|| "not set".to_string());
    let next = match settings.next_send_at.filter(|_| settings.enabled) {
        Some(at) => format!("<t:{}:R>", at),
        None => "n/a".to_string(),
    };

    format!(
        "**Revive chat**\nStatus: {}\nChannel: {}\nRole: {}\nInterval: {}\nNext message: {}",
        state,
        channel,
        role,
        format_interval(settings.interval_secs),
        next
    )
}

/// Post a conversation starter when a channel goes quiet
#[poise::command(slash_command, guild_only)]
pub async fn revivechat(
    ctx: Context<'_>,
    #[description = "What to do"] action: ReviveAction,
    #[description = "Channel to revive"]
    #[channel_types("Text", "News")]
    channel: Option<serenity::GuildChannel>,
    #[description = "Role to ping"] role: Option<serenity::Role>,
    #[description = "How often to check, e.g. 30m or 2h (1m to 24h)"] interval: Option<String>,
) -> Result<(), Error> {
    let guild_id = require(ctx, CommandName::Revivechat).await?;
    let data = ctx.data();

    match action {
        ReviveAction::Status => {
            let cfg = data.store.snapshot(guild_id.get()).await?;
            let running = data.revive.is_running(guild_id.get());
            reply_ephemeral(ctx, render_status(&cfg.revive_chat, running)).await
        }
        ReviveAction::Disable => {
            let was_enabled = data
                .store
                .update(guild_id.get(), |cfg| cfg.disable_revive_chat())
                .await?;
            data.revive.stop(guild_id.get());
            if was_enabled {
                info!("Revive chat disabled in guild {}", guild_id);
                reply_ephemeral(ctx, "✅ Revive chat disabled.").await
            } else {
                reply_ephemeral(ctx, "ℹ️ Revive chat was not enabled.").await
            }
        }
        ReviveAction::Enable => {
            let (Some(channel), Some(role)) = (channel, role) else {
                return reply_ephemeral(
                    ctx,
                    "❌ Please provide both a channel and a role to enable revive chat.",
                )
                .await;
            };

            let interval_secs = match interval.as_deref() {
                Some(raw) => match parse_interval(raw) {
                    Ok(parsed) => parsed.as_secs(),
                    Err(e) => return reply_ephemeral(ctx, format!("❌ {}", e)).await,
                },
                None => data.store.snapshot(guild_id.get()).await?.revive_chat.interval_secs,
            };
            let next_send_at = Utc::now().timestamp() + interval_secs as i64;

            let settings = data
                .store
                .update(guild_id.get(), |cfg| {
                    cfg.enable_revive_chat(channel.id.get(), role.id.get(), interval_secs, next_send_at);
                    cfg.revive_chat.clone()
                })
                .await?;
            data.revive.start(guild_id.get(), &settings);

            reply_ephemeral(
                ctx,
                format!(
                    "✅ Revive chat enabled in <#{}>. If the channel has been quiet, I'll ping <@&{}> every {}.",
                    channel.id,
                    role.id,
                    format_interval(interval_secs)
                ),
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_when_disabled() {
        let text = render_status(&ReviveChatSettings::default(), false);
        assert!(text.contains("❌ Disabled"));
        assert!(text.contains("Channel: not set"));
        assert!(text.contains("Interval: 1h"));
        assert!(text.contains("Next message: n/a"));
    }

    #[test]
    fn test_status_when_enabled() {
        let settings = ReviveChatSettings {
            enabled: true,
            channel_id: Some(10),
            role_id: Some(20),
            interval_secs: 1800,
            next_send_at: Some(1_700_000_000),
        };
        let text = render_status(&settings, true);
        assert!(text.contains("✅ Enabled"));
        assert!(text.contains("<#10>"));
        assert!(text.contains("<@&20>"));
        assert!(text.contains("Interval: 30m"));
        assert!(text.contains("<t:1700000000:R>"));
    }
}
