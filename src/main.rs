use poise::serenity_prelude as serenity;
use shapes_relay::activity::ChannelActivity;
use shapes_relay::config::Config;
use shapes_relay::db::Database;
use shapes_relay::error::BotError;
use shapes_relay::revive::ReviveScheduler;
use shapes_relay::services::{
    auth::UserAuthService, config_store::ConfigStore, rate_limit::BotChatThrottle,
};
use shapes_relay::shapes::ShapesClient;
use shapes_relay::{commands, handler, presence, welcome, Data, Error};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Channels whose last human message is remembered for revive checks
const ACTIVITY_CAPACITY: usize = 10_000;

async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = handler::handle_message(ctx, new_message, data).await {
                error!("Message {} was not answered: {}", new_message.id, e);
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = welcome::greet_member(ctx, data, new_member).await {
                warn!(
                    "Welcome for {} in guild {} failed: {}",
                    new_member.user.id, new_member.guild_id, e
                );
            }
        }
        _ => {}
    }
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let text = match error.downcast_ref::<BotError>() {
                Some(BotError::PermissionDenied(denied)) => {
                    info!("{} denied for user {}", denied.command, ctx.author().id);
                    denied.user_message()
                }
                _ => {
                    error!("Command /{} failed: {}", ctx.command().name, error);
                    format!("❌ Something went wrong: {}", error)
                }
            };
            if let Err(e) = ctx
                .send(poise::CreateReply::default().content(text).ephemeral(true))
                .await
            {
                warn!("Could not report command error: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shapes_relay=info")),
        )
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);
    let token = config.bot_token.clone();

    let http_client = ShapesClient::http_client(&config)?;
    let db = Database::new(&config)?;
    db.execute_init()?;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            event_handler: |ctx, event, _framework, data| Box::pin(handle_event(ctx, event, data)),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Connected as {}", ready.user.name);

                if config.register_commands {
                    let commands = &framework.options().commands;
                    match config.dev_guild_id {
                        Some(guild_id) => {
                            poise::builtins::register_in_guild(
                                ctx,
                                commands,
                                serenity::GuildId::new(guild_id),
                            )
                            .await?;
                            info!("Registered {} commands in guild {}", commands.len(), guild_id);
                        }
                        None => {
                            poise::builtins::register_globally(ctx, commands).await?;
                            info!("Registered {} commands globally", commands.len());
                        }
                    }
                }

                ctx.set_presence(
                    presence::activity(&config),
                    presence::online_status(config.status),
                );

                let store = Arc::new(ConfigStore::new(db.clone()));
                let shapes = Arc::new(ShapesClient::new(&config, http_client.clone()));
                let auth = UserAuthService::new(db, http_client, &config.shapes_auth_url);
                let activity = ChannelActivity::new(ACTIVITY_CAPACITY);
                let revive = ReviveScheduler::new(
                    ctx.http.clone(),
                    store.clone(),
                    shapes.clone(),
                    activity.clone(),
                    config.revive_silence_secs.map(Duration::from_secs),
                );
                match revive.resume_all().await {
                    Ok(count) => info!("Resumed revive chat in {} guild(s)", count),
                    Err(e) => error!("Failed to resume revive chat timers: {}", e),
                }

                Ok(Data {
                    bot_id: ready.user.id.get(),
                    config,
                    store,
                    shapes,
                    auth,
                    bot_throttle: BotChatThrottle::default(),
                    activity,
                    revive,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES;

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
