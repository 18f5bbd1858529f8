use crate::config::ReplyStyle;
use crate::error::BotError;
use crate::shapes::DownloadedFile;
use poise::serenity_prelude as serenity;
use serenity::{CreateAllowedMentions, CreateAttachment, CreateMessage};
use std::time::Duration;
use tracing::{debug, warn};

const CHUNK_PAUSE: Duration = Duration::from_millis(750);

/// How an answer is attached to the triggering message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyTarget {
    Reply { ping: bool },
    Channel,
}

impl ReplyTarget {
    /// DMs always get plain channel messages.
    pub fn for_style(style: ReplyStyle, is_dm: bool) -> Self {
        if is_dm {
            return ReplyTarget::Channel;
        }
        match style {
            ReplyStyle::ReplyWithPing => ReplyTarget::Reply { ping: true },
            ReplyStyle::ReplyNoPing => ReplyTarget::Reply { ping: false },
            ReplyStyle::DirectMessage => ReplyTarget::Channel,
        }
    }
}

fn build_message(
    origin: &serenity::Message,
    target: ReplyTarget,
    content: &str,
    files: &[DownloadedFile],
) -> CreateMessage {
    let mentions = CreateAllowedMentions::new()
        .all_users(true)
        .all_roles(false)
        .everyone(false);

    let mut builder = CreateMessage::new().content(content);
    builder = match target {
        ReplyTarget::Reply { ping } => builder
            .reference_message(origin)
            .allowed_mentions(mentions.replied_user(ping)),
        ReplyTarget::Channel => builder.allowed_mentions(mentions),
    };

    let attachments: Vec<CreateAttachment> = files
        .iter()
        .map(|f| CreateAttachment::bytes(f.data.clone(), f.filename.clone()))
        .collect();
    builder.add_files(attachments)
}

/// Send an answer split into chunks. Files ride on the first chunk; if Discord
/// refuses them the chunk is sent again without files.
pub async fn send_chunks(
    http: &serenity::Http,
    origin: &serenity::Message,
    target: ReplyTarget,
    chunks: &[String],
    files: &[DownloadedFile],
) -> Result<Vec<serenity::MessageId>, BotError> {
    let mut sent = Vec::with_capacity(chunks.len());

    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(CHUNK_PAUSE).await;
        }

        let chunk_files = if i == 0 { files } else { &[] };
        let result = origin
            .channel_id
            .send_message(http, build_message(origin, target, chunk, chunk_files))
            .await;

        let message = match result {
            Ok(message) => message,
            Err(e) if !chunk_files.is_empty() => {
                warn!(
                    "Sending chunk with {} file(s) to {} failed ({}), retrying without files",
                    chunk_files.len(),
                    origin.channel_id,
                    e
                );
                origin
                    .channel_id
                    .send_message(http, build_message(origin, target, chunk, &[]))
                    .await
                    .map_err(BotError::Delivery)?
            }
            Err(e) => return Err(BotError::Delivery(e)),
        };
        sent.push(message.id);
    }

    debug!("Sent {} chunk(s) to channel {}", sent.len(), origin.channel_id);
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_target_by_style() {
        assert_eq!(
            ReplyTarget::for_style(ReplyStyle::ReplyWithPing, false),
            ReplyTarget::Reply { ping: true }
        );
        assert_eq!(
            ReplyTarget::for_style(ReplyStyle::ReplyNoPing, false),
            ReplyTarget::Reply { ping: false }
        );
        assert_eq!(
            ReplyTarget::for_style(ReplyStyle::DirectMessage, false),
            ReplyTarget::Channel
        );
        for style in [
            ReplyStyle::ReplyWithPing,
            ReplyStyle::ReplyNoPing,
            ReplyStyle::DirectMessage,
        ] {
            assert_eq!(ReplyTarget::for_style(style, true), ReplyTarget::Channel);
        }
    }
}
