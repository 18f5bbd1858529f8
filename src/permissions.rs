use crate::error::PermissionDenied;
use crate::guild::{CommandName, GuildConfig};
use poise::serenity_prelude as serenity;
use std::collections::HashMap;

/// Who is invoking a command, reduced to what the policy looks at.
#[derive(Debug, Clone, Default)]
pub struct Actor {
    pub user_id: u64,
    pub is_guild_owner: bool,
    /// Administrator or Manage Server
    pub is_admin: bool,
    pub role_ids: Vec<u64>,
}

impl Actor {
    fn is_bot_owner(&self, bot_owner: Option<u64>) -> bool {
        bot_owner == Some(self.user_id)
    }

    /// Bot owner, server owner or server admin.
    pub fn is_privileged(&self, bot_owner: Option<u64>) -> bool {
        self.is_bot_owner(bot_owner) || self.is_guild_owner || self.is_admin
    }

    fn holds_any(&self, roles: Option<&std::collections::BTreeSet<u64>>) -> bool {
        roles.is_some_and(|roles| self.role_ids.iter().any(|r| roles.contains(r)))
    }
}

fn denied(label: String, bot_owner: Option<u64>) -> PermissionDenied {
    PermissionDenied {
        command: label,
        owner_configured: bot_owner.is_some(),
    }
}

/// Slash command policy: privileged actors or a role granted for `command`.
pub fn check_permission(
    actor: &Actor,
    command: CommandName,
    guild: &GuildConfig,
    bot_owner: Option<u64>,
) -> Result<(), PermissionDenied> {
    if actor.is_privileged(bot_owner) || actor.holds_any(guild.granted_roles(command)) {
        return Ok(());
    }
    Err(denied(command.invocation(), bot_owner))
}

/// `!` commands are open until a guild grants roles for them.
pub fn check_shape_command(
    actor: &Actor,
    command: CommandName,
    guild: &GuildConfig,
    bot_owner: Option<u64>,
) -> Result<(), PermissionDenied> {
    if guild.granted_roles(command).is_none() {
        return Ok(());
    }
    check_permission(actor, command, guild, bot_owner)
}

/// Commands that cannot be delegated through grants, like `/permission`.
pub fn check_privileged(
    actor: &Actor,
    label: &str,
    bot_owner: Option<u64>,
) -> Result<(), PermissionDenied> {
    if actor.is_privileged(bot_owner) {
        return Ok(());
    }
    Err(denied(label.to_string(), bot_owner))
}

fn roles_grant_admin(
    guild_id: serenity::GuildId,
    guild_roles: &HashMap<serenity::RoleId, serenity::Role>,
    member_roles: &[serenity::RoleId],
) -> bool {
    // @everyone shares the guild's id
    let everyone = serenity::RoleId::new(guild_id.get());
    member_roles
        .iter()
        .chain(std::iter::once(&everyone))
        .filter_map(|id| guild_roles.get(id))
        .any(|role| {
            role.permissions
                .intersects(serenity::Permissions::ADMINISTRATOR | serenity::Permissions::MANAGE_GUILD)
        })
}

/// Build the [`Actor`] for `user_id` from the cache, falling back to HTTP.
///
/// `interaction_permissions` are the resolved permissions Discord attaches to
/// interactions; when present they replace the role scan.
pub async fn resolve_actor(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
    interaction_permissions: Option<serenity::Permissions>,
) -> Result<Actor, serenity::Error> {
    let member = guild_id.member(ctx, user_id).await?;

    let cached = guild_id.to_guild_cached(&ctx.cache).map(|guild| {
        (
            guild.owner_id,
            roles_grant_admin(guild_id, &guild.roles, &member.roles),
        )
    });
    let (owner_id, role_admin) = match cached {
        Some(found) => found,
        None => {
            let guild = guild_id.to_partial_guild(ctx).await?;
            let admin = roles_grant_admin(guild_id, &guild.roles, &member.roles);
            (guild.owner_id, admin)
        }
    };

    let is_admin = match interaction_permissions {
        Some(perms) => {
            perms.intersects(serenity::Permissions::ADMINISTRATOR | serenity::Permissions::MANAGE_GUILD)
        }
        None => role_admin,
    };

    Ok(Actor {
        user_id: user_id.get(),
        is_guild_owner: owner_id == user_id,
        is_admin,
        role_ids: member.roles.iter().map(|r| r.get()).collect(),
    })
}
