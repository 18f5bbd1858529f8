use crate::services::auth::UserAuthService;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use serenity::{ButtonStyle, ComponentInteraction, ComponentInteractionCollector, CreateActionRow, CreateButton};
use std::time::Duration;
use tracing::{info, warn};

const AUTH_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum AuthAction {
    #[name = "auth"]
    Auth,
    #[name = "deauth"]
    Deauth,
}

#[derive(Debug, poise::Modal)]
#[name = "Shapes App ID"]
struct AppIdModal {
    #[name = "App ID"]
    #[placeholder = "00000000-0000-0000-0000-000000000000"]
    #[min_length = 32]
    #[max_length = 40]
    app_id: String,
}

#[derive(Debug, poise::Modal)]
#[name = "Shapes authorization code"]
struct CodeModal {
    #[name = "Code"]
    #[placeholder = "Paste the code from shapes.inc"]
    #[min_length = 1]
    #[max_length = 200]
    code: String,
}

fn button_row(custom_id: &str, label: &str) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![CreateButton::new(custom_id)
        .label(label)
        .style(ButtonStyle::Primary)])]
}

fn code_instructions(app_id: &str) -> String {
    format!(
        "**Step 2:** Open {} and log in to Shapes.\n\
         Copy the one-time code you are given, then press **Enter code** below.",
        UserAuthService::authorize_url(app_id)
    )
}

async fn await_button(ctx: Context<'_>, custom_id: String) -> Option<ComponentInteraction> {
    ComponentInteractionCollector::new(ctx.serenity_context())
        .author_id(ctx.author().id)
        .channel_id(ctx.channel_id())
        .filter(move |i| i.data.custom_id == custom_id)
        .timeout(AUTH_TIMEOUT)
        .await
}

async fn edit_reply(
    ctx: Context<'_>,
    handle: &poise::ReplyHandle<'_>,
    content: impl Into<String>,
    components: Vec<CreateActionRow>,
) -> Result<(), Error> {
    handle
        .edit(
            ctx,
            poise::CreateReply::default()
                .content(content)
                .components(components)
                .ephemeral(true),
        )
        .await?;
    Ok(())
}

/// Link your own Shapes account so the shape knows who you are
#[poise::command(slash_command)]
pub async fn auth(
    ctx: Context<'_>,
    #[description = "auth (default) to link your account, deauth to unlink it"]
    action: Option<AuthAction>,
) -> Result<(), Error> {
    let data = ctx.data();
    let user_id = ctx.author().id.get();

    if action == Some(AuthAction::Deauth) {
        let removed = data.auth.revoke(user_id).await?;
        let text = if removed {
            "✅ Your Shapes authorization has been removed."
        } else {
            "ℹ️ You were not authorized."
        };
        ctx.send(poise::CreateReply::default().content(text).ephemeral(true))
            .await?;
        return Ok(());
    }

    let app_id_button = format!("{}_app_id", ctx.id());
    let code_button = format!("{}_code", ctx.id());
    let already = data.auth.credentials(user_id).await?.is_some();
    let note = if already {
        "You are already authorized; continuing will replace your token.\n"
    } else {
        ""
    };

    let preset_app_id = data
        .config
        .shapes_app_id
        .as_deref()
        .and_then(UserAuthService::validate_app_id);

    let (handle, app_id) = match preset_app_id {
        Some(app_id) => {
            let handle = ctx
                .send(
                    poise::CreateReply::default()
                        .content(format!("{}{}", note, code_instructions(&app_id)))
                        .components(button_row(&code_button, "Enter code"))
                        .ephemeral(true),
                )
                .await?;
            (handle, app_id)
        }
        None => {
            let handle = ctx
                .send(
                    poise::CreateReply::default()
                        .content(format!(
                            "{}**Step 1:** Press **Enter App ID** and paste the App ID from your \
                             Shapes developer settings.",
                            note
                        ))
                        .components(button_row(&app_id_button, "Enter App ID"))
                        .ephemeral(true),
                )
                .await?;

            let Some(press) = await_button(ctx, app_id_button).await else {
                return edit_reply(ctx, &handle, "⌛ Authorization timed out.", Vec::new()).await;
            };
            let Some(modal) = poise::execute_modal_on_component_interaction::<AppIdModal>(
                ctx,
                press,
                None,
                Some(AUTH_TIMEOUT),
            )
            .await?
            else {
                return edit_reply(ctx, &handle, "⌛ Authorization timed out.", Vec::new()).await;
            };

            let Some(app_id) = UserAuthService::validate_app_id(&modal.app_id) else {
                return edit_reply(
                    ctx,
                    &handle,
                    "❌ That App ID is not valid. It should look like \
                     `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`. Run `/auth` again.",
                    Vec::new(),
                )
                .await;
            };
            edit_reply(
                ctx,
                &handle,
                code_instructions(&app_id),
                button_row(&code_button, "Enter code"),
            )
            .await?;
            (handle, app_id)
        }
    };

    let Some(press) = await_button(ctx, code_button).await else {
        return edit_reply(ctx, &handle, "⌛ Authorization timed out.", Vec::new()).await;
    };
    let Some(modal) = poise::execute_modal_on_component_interaction::<CodeModal>(
        ctx,
        press,
        None,
        Some(AUTH_TIMEOUT),
    )
    .await?
    else {
        return edit_reply(ctx, &handle, "⌛ Authorization timed out.", Vec::new()).await;
    };

    match data.auth.exchange_code(user_id, &app_id, &modal.code).await {
        Ok(()) => {
            info!("User {} authorized with Shapes app {}", user_id, app_id);
            edit_reply(
                ctx,
                &handle,
                "✅ You're authorized! The shape will now recognize you across servers.",
                Vec::new(),
            )
            .await
        }
        Err(e) => {
            warn!("Shapes authorization failed for user {}: {}", user_id, e);
            edit_reply(
                ctx,
                &handle,
                "❌ Authorization failed. The code may be invalid or expired. Run `/auth` to try again.",
                Vec::new(),
            )
            .await
        }
    }
}
