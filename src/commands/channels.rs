use super::require;
use crate::guild::{ChannelList, CommandName, GuildConfig};
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use serenity::{
    ButtonStyle, ChannelType, ComponentInteractionCollector, ComponentInteractionDataKind,
    CreateActionRow, CreateButton, CreateInteractionResponse, CreateInteractionResponseMessage,
    CreateSelectMenu, CreateSelectMenuKind,
};
use std::time::Duration;
use tracing::info;

const MENU_TIMEOUT: Duration = Duration::from_secs(180);
const MAX_SELECTED: u8 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Add,
    Remove,
    Clear,
    Done,
}

impl MenuAction {
    fn id(self, prefix: &str) -> String {
        let suffix = match self {
            MenuAction::Add => "add",
            MenuAction::Remove => "remove",
            MenuAction::Clear => "clear",
            MenuAction::Done => "done",
        };
        format!("{}_{}", prefix, suffix)
    }

    fn from_id(prefix: &str, custom_id: &str) -> Option<Self> {
        match custom_id.strip_prefix(prefix)?.strip_prefix('_')? {
            "add" => Some(MenuAction::Add),
            "remove" => Some(MenuAction::Remove),
            "clear" => Some(MenuAction::Clear),
            "done" => Some(MenuAction::Done),
            _ => None,
        }
    }
}

/// Apply one menu action; returns how many channels changed.
fn apply(cfg: &mut GuildConfig, list: ChannelList, action: MenuAction, channels: &[u64]) -> usize {
    match action {
        MenuAction::Add => channels
            .iter()
            .filter(|c| cfg.add_to_channel_list(list, **c))
            .count(),
        MenuAction::Remove => channels
            .iter()
            .filter(|c| cfg.remove_from_channel_list(list, **c))
            .count(),
        MenuAction::Clear => {
            let existing: Vec<u64> = cfg.channel_list(list).iter().copied().collect();
            existing
                .iter()
                .filter(|c| cfg.remove_from_channel_list(list, **c))
                .count()
        }
        MenuAction::Done => 0,
    }
}

fn describe(cfg: &GuildConfig, list: ChannelList) -> String {
    let channels = cfg.channel_list(list);
    let explanation = match list {
        ChannelList::Blacklist => "I will ignore messages in these channels.",
        ChannelList::Whitelist => "I will only respond in these channels.",
    };
    if channels.is_empty() {
        return format!("**{}** is empty.\n{}", title(list), explanation);
    }
    let mentions: Vec<String> = channels.iter().map(|c| format!("<#{}>", c)).collect();
    format!(
        "**{}** ({}):\n{}\n{}",
        title(list),
        channels.len(),
        mentions.join(", "),
        explanation
    )
}

fn title(list: ChannelList) -> &'static str {
    match list {
        ChannelList::Blacklist => "Blacklist",
        ChannelList::Whitelist => "Whitelist",
    }
}

fn components(prefix: &str, list: ChannelList) -> Vec<CreateActionRow> {
    let select = |action: MenuAction, placeholder: String| {
        CreateActionRow::SelectMenu(
            CreateSelectMenu::new(
                action.id(prefix),
                CreateSelectMenuKind::Channel {
                    channel_types: Some(vec![ChannelType::Text, ChannelType::News]),
                    default_channels: None,
                },
            )
            .placeholder(placeholder)
            .min_values(1)
            .max_values(MAX_SELECTED),
        )
    };

    vec![
        select(
            MenuAction::Add,
            format!("Add channels to the {}", list.as_str()),
        ),
        select(
            MenuAction::Remove,
            format!("Remove channels from the {}", list.as_str()),
        ),
        CreateActionRow::Buttons(vec![
            CreateButton::new(MenuAction::Clear.id(prefix))
                .label("Clear all")
                .style(ButtonStyle::Danger),
            CreateButton::new(MenuAction::Done.id(prefix))
                .label("Done")
                .style(ButtonStyle::Secondary),
        ]),
    ]
}

async fn channel_menu(ctx: Context<'_>, list: ChannelList, command: CommandName) -> Result<(), Error> {
    let guild_id = require(ctx, command).await?;
    let store = &ctx.data().store;
    let prefix = format!("{}_{}", list.as_str(), ctx.id());

    let cfg = store.snapshot(guild_id.get()).await?;
    ctx.send(
        poise::CreateReply::default()
            .content(describe(&cfg, list))
            .components(components(&prefix, list))
            .ephemeral(true),
    )
    .await?;

    loop {
        let filter_prefix = prefix.clone();
        let Some(interaction) = ComponentInteractionCollector::new(ctx.serenity_context())
            .author_id(ctx.author().id)
            .channel_id(ctx.channel_id())
            .filter(move |i| i.data.custom_id.starts_with(&filter_prefix))
            .timeout(MENU_TIMEOUT)
            .await
        else {
            break;
        };

        let Some(action) = MenuAction::from_id(&prefix, &interaction.data.custom_id) else {
            continue;
        };

        let selected: Vec<u64> = match &interaction.data.kind {
            ComponentInteractionDataKind::ChannelSelect { values } => {
                values.iter().map(|c| c.get()).collect()
            }
            _ => Vec::new(),
        };

        let (changed, cleared_opposite, cfg) = store
            .update(guild_id.get(), |cfg| {
                let had_opposite = !cfg.channel_list(list.opposite()).is_empty();
                let changed = apply(cfg, list, action, &selected);
                let cleared = had_opposite && cfg.channel_list(list.opposite()).is_empty();
                (changed, cleared, cfg.clone())
            })
            .await?;
        if changed > 0 {
            info!(
                "{:?} {} channel(s) on the {} of guild {}",
                action,
                changed,
                list.as_str(),
                guild_id
            );
        }

        let mut content = describe(&cfg, list);
        if cleared_opposite {
            content.push_str(&format!("\nThe {} was cleared.", list.opposite().as_str()));
        }

        let mut response = CreateInteractionResponseMessage::new().content(content);
        response = if action == MenuAction::Done {
            response.components(Vec::new())
        } else {
            response.components(components(&prefix, list))
        };
        interaction
            .create_response(ctx.http(), CreateInteractionResponse::UpdateMessage(response))
            .await?;

        if action == MenuAction::Done {
            break;
        }
    }

    Ok(())
}

/// Choose channels where the bot never responds
#[poise::command(slash_command, guild_only)]
pub async fn blacklist(ctx: Context<'_>) -> Result<(), Error> {
    channel_menu(ctx, ChannelList::Blacklist, CommandName::Blacklist).await
}

/// Choose the only channels where the bot responds
#[poise::command(slash_command, guild_only)]
pub async fn whitelist(ctx: Context<'_>) -> Result<(), Error> {
    channel_menu(ctx, ChannelList::Whitelist, CommandName::Whitelist).await
}
