use super::{reply_ephemeral, require};
use crate::guild::CommandName;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum BlockAction {
    #[name = "block"]
    Block,
    #[name = "unblock"]
    Unblock,
}

/// Why `target` cannot be blocked, if it can't.
fn protected_target(
    target: u64,
    author: u64,
    bot_id: u64,
    bot_owner: Option<u64>,
    guild_owner: Option<u64>,
) -> Option<&'static str> {
    if target == author {
        Some("❌ You can't block yourself.")
    } else if target == bot_id {
        Some("❌ I can't block myself.")
    } else if bot_owner == Some(target) {
        Some("❌ The bot owner can't be blocked.")
    } else if guild_owner == Some(target) && bot_owner != Some(author) {
        Some("❌ The server owner can't be blocked.")
    } else {
        None
    }
}

/// Block or unblock a user from talking to the bot in this server
#[poise::command(slash_command, guild_only)]
pub async fn block(
    ctx: Context<'_>,
    #[description = "The user"] user: serenity::User,
    #[description = "Block or unblock"] action: BlockAction,
) -> Result<(), Error> {
    let guild_id = require(ctx, CommandName::Block).await?;
    let data = ctx.data();

    if action == BlockAction::Block {
        let guild_owner = ctx.guild().map(|g| g.owner_id.get());
        if let Some(reason) = protected_target(
            user.id.get(),
            ctx.author().id.get(),
            data.bot_id,
            data.config.bot_owner,
            guild_owner,
        ) {
            return reply_ephemeral(ctx, reason).await;
        }
    }

    let target = user.id.get();
    let changed = data
        .store
        .update(guild_id.get(), |cfg| match action {
            BlockAction::Block => cfg.block_user(target),
            BlockAction::Unblock => cfg.unblock_user(target),
        })
        .await?;
    if changed {
        info!("{:?} user {} in guild {}", action, target, guild_id);
    }

    let text = match (action, changed) {
        (BlockAction::Block, true) => format!("🚫 <@{}> is now blocked from using the bot.", target),
        (BlockAction::Block, false) => format!("ℹ️ <@{}> is already blocked.", target),
        (BlockAction::Unblock, true) => format!("✅ <@{}> can use the bot again.", target),
        (BlockAction::Unblock, false) => format!("ℹ️ <@{}> was not blocked.", target),
    };
    reply_ephemeral(ctx, text).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHOR: u64 = 10;
    const BOT: u64 = 20;
    const OWNER: Option<u64> = Some(30);
    const GUILD_OWNER: Option<u64> = Some(40);

    #[test]
    fn test_protected_targets() {
        assert!(protected_target(AUTHOR, AUTHOR, BOT, OWNER, GUILD_OWNER).is_some());
        assert!(protected_target(BOT, AUTHOR, BOT, OWNER, GUILD_OWNER).is_some());
        assert!(protected_target(30, AUTHOR, BOT, OWNER, GUILD_OWNER).is_some());
        assert!(protected_target(40, AUTHOR, BOT, OWNER, GUILD_OWNER).is_some());
        assert_eq!(protected_target(50, AUTHOR, BOT, OWNER, GUILD_OWNER), None);
    }

    #[test]
    fn test_bot_owner_may_block_server_owner() {
        assert_eq!(protected_target(40, 30, BOT, OWNER, GUILD_OWNER), None);
    }
}
