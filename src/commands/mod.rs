pub mod activate;
pub mod auth;
pub mod block;
pub mod botchat;
pub mod channels;
pub mod permission;
pub mod revivechat;
pub mod say;
pub mod trigger;
pub mod welcome;

use crate::error::BotError;
use crate::guild::CommandName;
use crate::permissions::{check_permission, resolve_actor, Actor};
use crate::{Context, Data, Error};
use poise::serenity_prelude as serenity;

/// Every slash command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        activate::activate(),
        block::block(),
        channels::blacklist(),
        channels::whitelist(),
        trigger::trigger(),
        permission::permission(),
        revivechat::revivechat(),
        welcome::welcome(),
        botchat::botchat(),
        say::say(),
        auth::auth(),
    ]
}

/// Resolve the invoking member into an [`Actor`].
pub(crate) async fn actor(ctx: Context<'_>) -> Result<(serenity::GuildId, Actor), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command can only be used in a server.")?;
    let interaction_permissions = ctx.author_member().await.and_then(|m| m.permissions);
    let actor = resolve_actor(
        ctx.serenity_context(),
        guild_id,
        ctx.author().id,
        interaction_permissions,
    )
    .await?;
    Ok((guild_id, actor))
}

/// Fail with `PermissionDenied` unless the caller may run `command` here.
pub(crate) async fn require(
    ctx: Context<'_>,
    command: CommandName,
) -> Result<serenity::GuildId, Error> {
    let (guild_id, actor) = actor(ctx).await?;
    let cfg = ctx.data().store.snapshot(guild_id.get()).await?;
    check_permission(&actor, command, &cfg, ctx.data().config.bot_owner)
        .map_err(BotError::from)?;
    Ok(guild_id)
}

pub(crate) async fn reply_ephemeral(ctx: Context<'_>, content: impl Into<String>) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
