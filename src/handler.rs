use crate::config::RELAY_CHUNK_LIMIT;
use crate::discord_text::{
    attachment_label, build_prompt, extract_message_text, extract_shapes_files, media_links,
    resolve_mentions, split_message, sticker_label, strip_bot_mentions, LinkedMedia, PromptParts,
    ReplyContext,
};
use crate::error::{ApiError, BotError, PermissionDenied};
use crate::gate::{decide, MessageEvent, ResponseMode};
use crate::guild::{CommandName, GuildConfig};
use crate::permissions::{check_shape_command, resolve_actor, Actor};
use crate::reply::{send_chunks, ReplyTarget};
use crate::services::rate_limit::BotChatThrottle;
use crate::shapes::{ChatRequest, ContentPart, DownloadedFile, MessageContent};
use crate::Data;
use poise::serenity_prelude as serenity;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const REAUTH_MESSAGE: &str =
    "Your authentication has expired. Please use `/auth` to re-authenticate.";
const FILES_ONLY_MESSAGE: &str = "I generated a response with files, but no text content.";
const EMPTY_ANSWER_MESSAGE: &str =
    "I'm having trouble generating a response right now. Please try again later.";
const FAILURE_MESSAGE: &str =
    "❌ Something went wrong while handling your message. Please try again later.";

fn display_name(message: &serenity::Message) -> &str {
    message
        .member
        .as_ref()
        .and_then(|m| m.nick.as_deref())
        .unwrap_or_else(|| message.author.display_name())
}

fn reply_target(data: &Data, message: &serenity::Message) -> ReplyTarget {
    ReplyTarget::for_style(data.config.reply_style, message.guild_id.is_none())
}

/// Text to post when the cleaned answer is empty. `None` means stay silent.
fn empty_answer_text(
    has_files: bool,
    bot_conversation: bool,
    error_template: Option<&str>,
) -> Option<String> {
    if has_files {
        return Some(FILES_ONLY_MESSAGE.to_string());
    }
    if bot_conversation {
        return None;
    }
    Some(error_template.unwrap_or(EMPTY_ANSWER_MESSAGE).to_string())
}

/// What the author sees when an accepted message could not be answered.
/// Bot conversations and failed sends stay silent.
fn failure_notice(
    err: &BotError,
    bot_conversation: bool,
    error_template: Option<&str>,
) -> Option<String> {
    match err {
        BotError::Delivery(_) => None,
        _ if bot_conversation => None,
        BotError::PermissionDenied(denied) => Some(denied.user_message()),
        BotError::Api(e) => Some(e.user_message(error_template)),
        BotError::Discord(_) | BotError::Storage(_) => Some(FAILURE_MESSAGE.to_string()),
    }
}

/// A shape command needs the author's roles only once the guild has granted
/// roles for it.
fn shape_command_needs_actor(command: Option<CommandName>, cfg: Option<&GuildConfig>) -> bool {
    match (command, cfg) {
        (Some(command), Some(cfg)) => cfg.granted_roles(command).is_some(),
        _ => false,
    }
}

/// Whether a message may be relayed at all. Checked before any request is built.
fn relay_permitted(
    command: Option<CommandName>,
    cfg: Option<&GuildConfig>,
    actor: Option<&Actor>,
    bot_owner: Option<u64>,
) -> Result<(), PermissionDenied> {
    let (Some(command), Some(cfg)) = (command, cfg) else {
        return Ok(());
    };
    let nobody = Actor::default();
    check_shape_command(actor.unwrap_or(&nobody), command, cfg, bot_owner)
}

/// Entry point for `FullEvent::Message`.
///
/// Once a message is accepted every failure is answered with a notice before
/// the error is returned for logging.
pub async fn handle_message(
    ctx: &serenity::Context,
    message: &serenity::Message,
    data: &Data,
) -> Result<(), BotError> {
    if message.author.id.get() == data.bot_id {
        return Ok(());
    }

    let channel_id = message.channel_id.get();
    let author_id = message.author.id.get();
    let bot_conversation = message.author.bot;
    let now = Instant::now();
    if bot_conversation {
        data.bot_throttle
            .note_message(channel_id, author_id, message.id.get(), now);
    } else {
        data.activity.record(channel_id, now);
    }

    let bot_user = serenity::UserId::new(data.bot_id);
    let mentions_bot = message.mentions_user_id(bot_user);
    let replies_to_bot = message
        .referenced_message
        .as_deref()
        .is_some_and(|m| m.author.id == bot_user);

    let guild_cfg = match message.guild_id {
        Some(guild_id) => match data.store.snapshot(guild_id.get()).await {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                // Without the guild record only a direct address is known to want an answer
                if !bot_conversation && (mentions_bot || replies_to_bot) {
                    let notice = [FAILURE_MESSAGE.to_string()];
                    deliver(ctx, message, reply_target(data, message), &notice, &[]).await;
                }
                return Err(BotError::Storage(e));
            }
        },
        None => None,
    };

    let event = MessageEvent {
        author_id,
        author_is_bot: bot_conversation,
        channel_id,
        guild_id: message.guild_id.map(|g| g.get()),
        content: &message.content,
        mentions_bot,
        replies_to_bot,
    };
    let Some(mode) = decide(&event, guild_cfg.as_ref(), &data.config.trigger_words).mode() else {
        return Ok(());
    };

    let result = relay(ctx, message, data, mode, guild_cfg.as_ref()).await;
    if let Err(e) = &result {
        let notice = failure_notice(e, bot_conversation, data.config.error_message.as_deref());
        if let Some(notice) = notice {
            deliver(ctx, message, reply_target(data, message), &[notice], &[]).await;
        }
    }
    result
}

/// Everything after the gate: permission check, throttle, API call, delivery.
async fn relay(
    ctx: &serenity::Context,
    message: &serenity::Message,
    data: &Data,
    mode: ResponseMode,
    guild_cfg: Option<&GuildConfig>,
) -> Result<(), BotError> {
    let channel_id = message.channel_id.get();
    let author_id = message.author.id.get();
    let bot_conversation = message.author.bot;

    let content = strip_bot_mentions(&message.content, data.bot_id);
    let shape_command = CommandName::from_message(&content);

    let actor = match message.guild_id {
        Some(guild_id) if shape_command_needs_actor(shape_command, guild_cfg) => Some(
            resolve_actor(ctx, guild_id, message.author.id, None)
                .await
                .map_err(BotError::Discord)?,
        ),
        _ => None,
    };
    if let Err(denied) =
        relay_permitted(shape_command, guild_cfg, actor.as_ref(), data.config.bot_owner)
    {
        info!(
            "Denied {} for user {} in channel {}",
            denied.command, author_id, channel_id
        );
        return Err(denied.into());
    }

    if bot_conversation {
        if !data.bot_throttle.allows_reply(channel_id, Instant::now()) {
            debug!("Bot reply throttled in channel {}", channel_id);
            return Ok(());
        }
        tokio::time::sleep(BotChatThrottle::reply_delay()).await;
        if !data
            .bot_throttle
            .is_latest(channel_id, author_id, message.id.get())
        {
            debug!(
                "Newer message from bot {} in channel {}, skipping reply",
                author_id, channel_id
            );
            return Ok(());
        }
        // Another reply may have gone out during the delay
        if !data.bot_throttle.allows_reply(channel_id, Instant::now()) {
            debug!("Bot reply throttled after delay in channel {}", channel_id);
            return Ok(());
        }
    }

    info!(
        "Relaying message {} from {} in channel {} ({:?})",
        message.id, message.author.name, channel_id, mode
    );

    let typing = message.channel_id.start_typing(&ctx.http);

    let credentials = match data.auth.credentials(author_id).await {
        Ok(creds) => creds,
        Err(e) => {
            warn!("Could not load auth token for user {}: {}", author_id, e);
            None
        }
    };

    let request = ChatRequest {
        content: build_content(data, message, &content, shape_command.is_some(), mode).await,
        user_id: Some(author_id),
        channel_id: Some(channel_id),
        credentials,
    };
    let result = data.shapes.complete(&request).await;
    drop(typing);

    let target = reply_target(data, message);
    let answer = match result {
        Ok(answer) => answer,
        Err(ApiError::Unauthorized) if request.credentials.is_some() => {
            if let Err(e) = data.auth.revoke(author_id).await {
                error!("Failed to remove expired token for user {}: {}", author_id, e);
            }
            send_chunks(&ctx.http, message, target, &[REAUTH_MESSAGE.to_string()], &[]).await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let (text, urls) = extract_shapes_files(&answer);
    let mut files = Vec::with_capacity(urls.len());
    for url in &urls {
        match data.shapes.download_file(url).await {
            Ok(file) => files.push(file),
            Err(e) => warn!("Could not download {}: {}", url, e),
        }
    }

    let chunks = if text.is_empty() {
        match empty_answer_text(
            !files.is_empty(),
            bot_conversation,
            data.config.error_message.as_deref(),
        ) {
            Some(notice) => vec![notice],
            None => return Ok(()),
        }
    } else {
        split_message(&text, RELAY_CHUNK_LIMIT)
    };

    send_chunks(&ctx.http, message, target, &chunks, &files).await?;
    if bot_conversation {
        data.bot_throttle.record_reply(channel_id, Instant::now());
    }
    Ok(())
}

/// Media parts and text labels gathered from one message.
#[derive(Debug, Default)]
struct MessageMedia {
    parts: Vec<ContentPart>,
    labels: Vec<String>,
}

impl MessageMedia {
    fn is_empty(&self) -> bool {
        self.parts.is_empty() && self.labels.is_empty()
    }
}

/// Image and audio links pasted in the message text.
fn link_parts(content: &str) -> Vec<ContentPart> {
    media_links(content)
        .into_iter()
        .map(|(kind, url)| match kind {
            LinkedMedia::Image => ContentPart::image(url),
            LinkedMedia::Audio => ContentPart::audio(url),
        })
        .collect()
}

async fn collect_media(data: &Data, message: &serenity::Message) -> MessageMedia {
    let mut media = MessageMedia::default();

    for attachment in &message.attachments {
        let content_type = attachment.content_type.as_deref();
        match content_type {
            Some(ct) if ct.starts_with("image/") => {
                let url = data
                    .shapes
                    .inline_image(&attachment.url, u64::from(attachment.size), content_type)
                    .await;
                media.parts.push(ContentPart::image(url));
            }
            Some(ct) if ct.starts_with("audio/") => {
                media.parts.push(ContentPart::audio(attachment.url.clone()));
            }
            _ => media
                .labels
                .push(attachment_label(content_type, &attachment.filename)),
        }
    }
    for sticker in &message.sticker_items {
        media.labels.push(sticker_label(&sticker.name));
        if let Some(url) = sticker.image_url() {
            media.parts.push(ContentPart::image(url));
        }
    }
    media.parts.extend(link_parts(&message.content));
    media
}

/// Text of a replied-to message followed by labels for its media.
fn reply_text_with_labels(text: &str, labels: &[String]) -> String {
    std::iter::once(text.trim())
        .chain(labels.iter().map(String::as_str))
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prompt text plus media parts for one message and the message it replies to.
async fn build_content(
    data: &Data,
    message: &serenity::Message,
    content: &str,
    verbatim: bool,
    mode: ResponseMode,
) -> MessageContent {
    let mut media = collect_media(data, message).await;

    if verbatim {
        return MessageContent::with_media(content.to_string(), media.parts);
    }

    let resolved = resolve_mentions(content, |id| {
        message
            .mentions
            .iter()
            .find(|user| user.id.get() == id)
            .map(|user| user.display_name().to_string())
    });

    let bare_ping = mode == ResponseMode::Mention && resolved.trim().is_empty() && media.is_empty();

    let mut reply_text = String::new();
    let reply_author = match message.referenced_message.as_deref() {
        Some(referenced) => {
            let replied = collect_media(data, referenced).await;
            reply_text = reply_text_with_labels(&extract_message_text(referenced), &replied.labels);
            media.parts.extend(replied.parts);
            Some(display_name(referenced))
        }
        None => None,
    };
    let reply = reply_author.map(|author| ReplyContext {
        author,
        text: &reply_text,
    });

    let prompt = build_prompt(&PromptParts {
        author: display_name(message),
        content: &resolved,
        labels: &media.labels,
        reply,
        bare_ping,
    });
    MessageContent::with_media(prompt, media.parts)
}

/// Send chunks and log failures; a failed delivery never propagates.
async fn deliver(
    ctx: &serenity::Context,
    origin: &serenity::Message,
    target: ReplyTarget,
    chunks: &[String],
    files: &[DownloadedFile],
) {
    if let Err(e) = send_chunks(&ctx.http, origin, target, chunks, files).await {
        error!("Could not send to channel {}: {}", origin.channel_id, e);
    }
}
