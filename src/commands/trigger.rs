use super::{reply_ephemeral, require};
use crate::guild::CommandName;
use crate::{Context, Error};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum TriggerAction {
    #[name = "add"]
    Add,
    #[name = "remove"]
    Remove,
    #[name = "list"]
    List,
}

fn render_list(guild_words: &[&str], global_words: &[String]) -> String {
    let mut out = String::from("**Trigger words**\n");
    if guild_words.is_empty() {
        out.push_str("Server: none\n");
    } else {
        out.push_str(&format!("Server: {}\n", quoted(guild_words.iter().copied())));
    }
    if !global_words.is_empty() {
        out.push_str(&format!(
            "Global: {}",
            quoted(global_words.iter().map(String::as_str))
        ));
    }
    out.trim_end().to_string()
}

fn quoted<'a>(words: impl Iterator<Item = &'a str>) -> String {
    words
        .map(|w| format!("`{}`", w))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Manage words that make the bot respond
#[poise::command(slash_command, guild_only)]
pub async fn trigger(
    ctx: Context<'_>,
    #[description = "What to do"] action: TriggerAction,
    #[description = "The trigger word (for add/remove)"] word: Option<String>,
) -> Result<(), Error> {
    let guild_id = require(ctx, CommandName::Trigger).await?;
    let store = &ctx.data().store;

    if action == TriggerAction::List {
        let cfg = store.snapshot(guild_id.get()).await?;
        let words: Vec<&str> = cfg.trigger_words.iter().map(String::as_str).collect();
        return reply_ephemeral(ctx, render_list(&words, &ctx.data().config.trigger_words)).await;
    }

    let Some(word) = word else {
        return reply_ephemeral(ctx, "❌ Please provide a trigger word.").await;
    };

    let result = store
        .update(guild_id.get(), |cfg| match action {
            TriggerAction::Add => cfg.add_trigger_word(&word),
            _ => cfg.remove_trigger_word(&word),
        })
        .await?;
    let word = word.trim().to_lowercase();

    let text = match (action, result) {
        (_, Err(e)) => format!("❌ {}", e),
        (TriggerAction::Add, Ok(true)) => {
            info!("Added trigger word '{}' in guild {}", word, guild_id);
            format!("✅ Added trigger word `{}`.", word)
        }
        (TriggerAction::Add, Ok(false)) => format!("ℹ️ `{}` is already a trigger word.", word),
        (_, Ok(true)) => {
            info!("Removed trigger word '{}' in guild {}", word, guild_id);
            format!("✅ Removed trigger word `{}`.", word)
        }
        (_, Ok(false)) => format!("ℹ️ `{}` is not a trigger word here.", word),
    };
    reply_ephemeral(ctx, text).await
}
