use crate::error::BotError;
use crate::Data;
use poise::serenity_prelude as serenity;
use rand::seq::IndexedRandom;
use serenity::{CreateAllowedMentions, CreateMessage};
use tracing::{debug, info, warn};

const FALLBACK_TEMPLATES: &[&str] = &[
    "Welcome to {server_name}, {mention}! 🎉 We're glad to have you here!",
    "Hey there {mention}! Welcome to {server_name}! Hope you enjoy your stay!",
    "Welcome {mention}! Great to have you join us in {server_name}!",
    "Hello {mention}! Welcome to our awesome community {server_name}!",
    "Welcome aboard {mention}! Thanks for joining {server_name}!",
    "Hey {mention}! Welcome to {server_name}! Looking forward to chatting with you!",
    "Welcome {mention}! {server_name} just got a little more awesome!",
    "Hi {mention}! Welcome to {server_name}! Hope you have a great time here!",
    "Welcome {mention}! So excited to have you in {server_name}!",
    "Hey there {mention}! Welcome to the {server_name} family!",
];

fn welcome_prompt(server_name: &str, member_name: &str, member_count: u64) -> String {
    format!(
        "Write a short welcome message (under 200 characters) for a new member joining a \
         Discord server.\nServer: {}\nNew member: {}\nThey are member number {}.\n\
         Keep it natural and friendly in your own tone and include their name. Do not list \
         rules or channels, do not @mention anyone, and reply with only the message.",
        server_name, member_name, member_count
    )
}

fn render_template(template: &str, server_name: &str, mention: &str) -> String {
    template
        .replace("{server_name}", server_name)
        .replace("{mention}", mention)
}

fn fallback_welcome(server_name: &str, mention: &str) -> String {
    let template = FALLBACK_TEMPLATES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(FALLBACK_TEMPLATES[0]);
    render_template(template, server_name, mention)
}

/// Greet a member who just joined, if the guild turned welcomes on.
pub async fn greet_member(
    ctx: &serenity::Context,
    data: &Data,
    member: &serenity::Member,
) -> Result<(), BotError> {
    let guild_id = member.guild_id.get();
    let settings = data
        .store
        .snapshot(guild_id)
        .await
        .map_err(BotError::Storage)?
        .welcome;
    let Some(channel_id) = settings.channel_id.filter(|_| settings.enabled) else {
        debug!("Welcome disabled for guild {}", guild_id);
        return Ok(());
    };

    let (server_name, member_count) = member
        .guild_id
        .to_guild_cached(&ctx.cache)
        .map(|guild| (guild.name.clone(), guild.member_count))
        .unwrap_or_else(|| ("the server".to_string(), 0));
    let mention = format!("<@{}>", member.user.id);

    let prompt = welcome_prompt(&server_name, member.display_name(), member_count);
    let content = match data.shapes.generate_line(&prompt).await {
        Ok(line) => format!("{} {}", line, mention),
        Err(e) => {
            warn!("Welcome generation failed for guild {}, using template: {}", guild_id, e);
            fallback_welcome(&server_name, &mention)
        }
    };

    serenity::ChannelId::new(channel_id)
        .send_message(
            &ctx.http,
            CreateMessage::new()
                .content(content)
                .allowed_mentions(CreateAllowedMentions::new().users(vec![member.user.id])),
        )
        .await
        .map_err(BotError::Delivery)?;

    info!(
        "Welcomed {} in guild {} (channel {})",
        member.user.name, guild_id, channel_id
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_mentions_member_and_server() {
        let msg = fallback_welcome("Rust Club", "<@42>");
        assert!(msg.contains("Rust Club"));
        assert!(msg.contains("<@42>"));
        assert!(!msg.contains('{'));
    }

    #[test]
    fn test_every_template_renders() {
        for template in FALLBACK_TEMPLATES {
            let msg = render_template(template, "Cafe", "<@7>");
            assert!(msg.contains("Cafe") && msg.contains("<@7>"), "{}", template);
        }
    }

    #[test]
    fn test_prompt_carries_details() {
        let prompt = welcome_prompt("Cafe", "Ada", 128);
        assert!(prompt.contains("Server: Cafe"));
        assert!(prompt.contains("New member: Ada"));
        assert!(prompt.contains("member number 128"));
    }
}
