pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;

/// One update delivered by the messaging API.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub update_id: u32,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Other,
}

#[derive(Debug, Clone)]
pub struct ChatInfo {
    pub id: i64,
    pub kind: ChatKind,
}

impl ChatInfo {
    pub fn is_private(&self) -> bool {
        self.kind == ChatKind::Private
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ChatKind::Group | ChatKind::Supergroup)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sender {
    pub first_name: Option<String>,
    pub username: Option<String>,
}

impl Sender {
    /// Handle if set, else given name, else `Anonymous`.
    pub fn display_handle(&self) -> &str {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.first_name.as_deref().filter(|n| !n.is_empty()))
            .unwrap_or("Anonymous")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Document,
    Photo,
}

/// The single media item relayed for a message.
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    /// Opaque content reference resolved through the messaging API.
    pub file_id: String,
    pub file_name: Option<String>,
}

/// A chat message reduced to what the relay needs.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message_id: i32,
    pub sender: Sender,
    pub chat: ChatInfo,
    /// Unix timestamp of the message.
    pub timestamp: i64,
    /// Message text, or the media caption.
    pub text: Option<String>,
    pub media: Option<MediaAttachment>,
}

/// Pick the attachment to relay: video, then document, then the
/// highest-resolution photo (the last one the platform lists).
pub fn select_media(
    video: Option<MediaAttachment>,
    document: Option<MediaAttachment>,
    photos: Vec<MediaAttachment>,
) -> Option<MediaAttachment> {
    video.or(document).or_else(|| photos.into_iter().last())
}

/// Inline button opening a URL, attached to a text reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

/// Outbound calls to the messaging API.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Long-poll for updates starting at `offset`.
    async fn fetch_updates(&self, offset: u32, timeout: Duration) -> Result<Vec<InboundEvent>>;

    /// Resolve a content reference to a downloadable path.
    async fn resolve_content_path(&self, file_id: &str) -> Result<String>;

    async fn download_bytes(&self, path: &str) -> Result<Vec<u8>>;

    async fn send_text(&self, chat_id: i64, text: &str, button: Option<&LinkButton>) -> Result<()>;

    async fn send_reaction(&self, chat_id: i64, message_id: i32, emoji: &str) -> Result<()>;
}

/// Feedback sent back to a chat. Delivery is best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Text {
        text: String,
        button: Option<LinkButton>,
    },
    Reaction {
        message_id: i32,
        emoji: &'static str,
    },
}

/// Deliver a notice, logging and discarding any failure.
pub async fn notify(messenger: &dyn Messenger, chat_id: i64, notice: Notice) {
    let result = match &notice {
        Notice::Text { text, button } => messenger.send_text(chat_id, text, button.as_ref()).await,
        Notice::Reaction { message_id, emoji } => {
            messenger.send_reaction(chat_id, *message_id, emoji).await
        }
    };
    if let Err(e) = result {
        warn!("Failed to deliver notice to chat {}: {}", chat_id, e);
    }
}

/// Operator log: every line goes to tracing and, best-effort, to the logs chat.
#[derive(Clone, Copy)]
pub struct ControlLog<'a> {
    messenger: &'a dyn Messenger,
    chat_id: i64,
}

impl<'a> ControlLog<'a> {
    pub fn new(messenger: &'a dyn Messenger, chat_id: i64) -> Self {
        Self { messenger, chat_id }
    }

    pub async fn log(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        info!(target: "control", "{}", line);
        let entry = format!("[{}] {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"), line);
        if let Err(e) = self.messenger.send_text(self.chat_id, &entry, None).await {
            warn!("Failed to send control log line to {}: {}", self.chat_id, e);
        }
    }
}
