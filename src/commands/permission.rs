use super::{actor, reply_ephemeral};
use crate::error::BotError;
use crate::guild::{CommandName, GuildConfig};
use crate::permissions::check_privileged;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum PermissionAction {
    #[name = "add"]
    Add,
    #[name = "remove"]
    Remove,
    #[name = "list"]
    List,
}

/// `command_name` value that lists every grant.
const LIST_ALL: &str = "all";

async fn autocomplete_command<'a>(
    _ctx: Context<'_>,
    partial: &'a str,
) -> impl Iterator<Item = String> + 'a {
    let partial = partial.to_lowercase();
    CommandName::ALL
        .into_iter()
        .map(CommandName::as_str)
        .chain(std::iter::once(LIST_ALL))
        .filter(move |name| name.starts_with(partial.trim_start_matches(['/', '!'])))
        .map(str::to_string)
}

/// The command an action applies to. `None` means every command and is only
/// accepted for `list`.
fn parse_target(action: PermissionAction, raw: &str) -> Result<Option<CommandName>, String> {
    if action == PermissionAction::List && raw.trim().eq_ignore_ascii_case(LIST_ALL) {
        return Ok(None);
    }
    CommandName::parse(raw).map(Some).ok_or_else(|| {
        let known: Vec<&str> = CommandName::ALL.iter().map(|c| c.as_str()).collect();
        format!("❌ Unknown command `{}`. Valid: {}", raw, known.join(", "))
    })
}

fn render_grants(cfg: &GuildConfig, only: Option<CommandName>) -> String {
    let lines: Vec<String> = CommandName::ALL
        .into_iter()
        .filter(|c| only.map_or(true, |o| o == *c))
        .filter_map(|c| {
            let roles = cfg.granted_roles(c)?;
            let mentions: Vec<String> = roles.iter().map(|r| format!("<@&{}>", r)).collect();
            Some(format!("`{}`: {}", c.invocation(), mentions.join(", ")))
        })
        .collect();

    if lines.is_empty() {
        return match only {
            Some(c) => format!("No extra roles can use `{}`.", c.invocation()),
            None => "No command permissions have been granted.".to_string(),
        };
    }
    format!("**Command permissions**\n{}", lines.join("\n"))
}

/// Grant roles access to bot commands
#[poise::command(slash_command, guild_only)]
pub async fn permission(
    ctx: Context<'_>,
    #[description = "What to do"] action: PermissionAction,
    #[description = "Command name, e.g. activate or imagine (all to list every grant)"]
    #[autocomplete = "autocomplete_command"]
    command_name: String,
    #[description = "The role (for add/remove)"] role: Option<serenity::Role>,
) -> Result<(), Error> {
    let (guild_id, actor) = actor(ctx).await?;
    check_privileged(&actor, "/permission", ctx.data().config.bot_owner)
        .map_err(BotError::from)?;

    let command = match parse_target(action, &command_name) {
        Ok(command) => command,
        Err(reason) => return reply_ephemeral(ctx, reason).await,
    };

    let store = &ctx.data().store;
    if action == PermissionAction::List {
        let cfg = store.snapshot(guild_id.get()).await?;
        return reply_ephemeral(ctx, render_grants(&cfg, command)).await;
    }

    let (Some(command), Some(role)) = (command, role) else {
        return reply_ephemeral(ctx, "❌ Please provide a role to add or remove.").await;
    };
    let role_id = role.id.get();

    let changed = store
        .update(guild_id.get(), |cfg| match action {
            PermissionAction::Add => cfg.grant_role(command, role_id),
            _ => cfg.revoke_role(command, role_id),
        })
        .await?;
    if changed {
        info!(
            "{:?} role {} for {} in guild {}",
            action,
            role_id,
            command.invocation(),
            guild_id
        );
    }

    let text = match (action, changed) {
        (PermissionAction::Add, true) => format!(
            "✅ <@&{}> can now use `{}`.",
            role_id,
            command.invocation()
        ),
        (PermissionAction::Add, false) => format!(
            "ℹ️ <@&{}> already has access to `{}`.",
            role_id,
            command.invocation()
        ),
        (_, true) => format!(
            "✅ <@&{}> can no longer use `{}`.",
            role_id,
            command.invocation()
        ),
        (_, false) => format!(
            "ℹ️ <@&{}> had no grant for `{}`.",
            role_id,
            command.invocation()
        ),
    };
    reply_ephemeral(ctx, text).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_grants() {
        let mut cfg = GuildConfig::default();
        assert_eq!(
            render_grants(&cfg, None),
            "No command permissions have been granted."
        );

        cfg.grant_role(CommandName::Imagine, 7);
        cfg.grant_role(CommandName::Activate, 8);
        assert_eq!(
            render_grants(&cfg, None),
            "**Command permissions**\n`/activate`: <@&8>\n`!imagine`: <@&7>"
        );
        assert_eq!(
            render_grants(&cfg, Some(CommandName::Say)),
            "No extra roles can use `/say`."
        );
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(
            parse_target(PermissionAction::Add, "imagine"),
            Ok(Some(CommandName::Imagine))
        );
        assert_eq!(parse_target(PermissionAction::List, "ALL"), Ok(None));
        assert_eq!(
            parse_target(PermissionAction::List, "trigger"),
            Ok(Some(CommandName::Trigger))
        );
        let err = parse_target(PermissionAction::Remove, "all").unwrap_err();
        assert!(err.starts_with("❌ Unknown command `all`"));
        assert!(parse_target(PermissionAction::Add, "nope").is_err());
    }
}
