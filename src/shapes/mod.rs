//! Shapes API request model and client.

pub mod client;

pub use client::ShapesClient;

use crate::services::auth::UserCredentials;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaUrl {
    pub url: String,
}

/// One part of a multimodal user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: MediaUrl },
    AudioUrl { audio_url: MediaUrl },
}

impl ContentPart {
    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: MediaUrl { url: url.into() },
        }
    }

    pub fn audio(url: impl Into<String>) -> Self {
        ContentPart::AudioUrl {
            audio_url: MediaUrl { url: url.into() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Plain text when there is no media, otherwise text followed by media parts.
    pub fn with_media(text: String, media: Vec<ContentPart>) -> Self {
        if media.is_empty() {
            return MessageContent::Text(text);
        }
        let mut parts = Vec::with_capacity(media.len() + 1);
        parts.push(ContentPart::Text { text });
        parts.extend(media);
        MessageContent::Parts(parts)
    }
}

/// Everything needed for one chat completion call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub content: MessageContent,
    pub user_id: Option<u64>,
    pub channel_id: Option<u64>,
    pub credentials: Option<UserCredentials>,
}

impl ChatRequest {
    /// A bot-originated prompt (revive lines, welcomes) with no user identity.
    pub fn system_prompt(text: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text(text.into()),
            user_id: None,
            channel_id: None,
            credentials: None,
        }
    }
}

/// A file the AI linked from `files.shapes.inc`, fetched for re-upload.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}
