use std::time::Duration;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    AllowedUpdate, FileId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ReactionType,
    UpdateKind,
};
use teloxide::{DownloadError, RequestError};
use tracing::debug;

use crate::config::TelegramConfig;
use crate::error::{RelayError, Result};
use crate::platform::{
    select_media, ChatInfo, ChatKind, InboundEvent, IncomingMessage, LinkButton, MediaAttachment,
    MediaKind, Messenger, Sender,
};

/// Slack on top of the long-poll wait before the HTTP client gives up.
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(20);

/// Telegram Bot API transport.
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(config.poll_timeout + CLIENT_TIMEOUT_SLACK)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build Telegram client: {}", e)))?;

        Ok(Self {
            bot: Bot::with_client(&config.bot_token, client),
        })
    }
}

/// Convert a Bot API update. Updates other than new messages carry no message.
pub fn to_inbound_event(update: &Update) -> InboundEvent {
    let message = match &update.kind {
        UpdateKind::Message(msg) => Some(to_incoming_message(msg)),
        _ => None,
    };
    InboundEvent {
        update_id: update.id.0,
        message,
    }
}

fn to_incoming_message(msg: &Message) -> IncomingMessage {
    let sender = msg
        .from
        .as_ref()
        .map(|user| Sender {
            first_name: Some(user.first_name.clone()),
            username: user.username.clone(),
        })
        .unwrap_or_default();

    let kind = if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_group() {
        ChatKind::Group
    } else if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Other
    };

    let video = msg.video().map(|v| MediaAttachment {
        kind: MediaKind::Video,
        file_id: v.file.id.to_string(),
        file_name: v.file_name.clone(),
    });
    let document = msg.document().map(|d| MediaAttachment {
        kind: MediaKind::Document,
        file_id: d.file.id.to_string(),
        file_name: d.file_name.clone(),
    });
    let photos = msg
        .photo()
        .unwrap_or_default()
        .iter()
        .map(|p| MediaAttachment {
            kind: MediaKind::Photo,
            file_id: p.file.id.to_string(),
            file_name: None,
        })
        .collect();

    IncomingMessage {
        message_id: msg.id.0,
        sender,
        chat: ChatInfo {
            id: msg.chat.id.0,
            kind,
        },
        timestamp: msg.date.timestamp(),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        media: select_media(video, document, photos),
    }
}

fn is_too_big(description: &str) -> bool {
    description.to_ascii_lowercase().contains("too big")
}

fn request_error(e: RequestError) -> RelayError {
    match e {
        RequestError::Network(_) | RequestError::RetryAfter(_) | RequestError::Io(_) => {
            RelayError::Network(e.to_string())
        }
        RequestError::Api(ref api) => {
            let description = api.to_string();
            let lower = description.to_ascii_lowercase();
            if is_too_big(&description) {
                RelayError::Oversized(description)
            } else if lower.contains("not found") || lower.contains("file_id") {
                RelayError::NotFound(description)
            } else {
                RelayError::Remote {
                    status: 400,
                    message: description,
                }
            }
        }
        other => RelayError::Remote {
            status: 502,
            message: other.to_string(),
        },
    }
}

fn download_error(e: DownloadError) -> RelayError {
    let status = match &e {
        DownloadError::Network(err) => err.status(),
        _ => None,
    };
    match status {
        Some(status) => RelayError::Remote {
            status: status.as_u16(),
            message: e.to_string(),
        },
        None => RelayError::Network(e.to_string()),
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn fetch_updates(&self, offset: u32, timeout: Duration) -> Result<Vec<InboundEvent>> {
        let updates = self
            .bot
            .get_updates()
            .offset(i32::try_from(offset).unwrap_or(i32::MAX))
            .timeout(u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX))
            .allowed_updates(vec![AllowedUpdate::Message])
            .await
            .map_err(request_error)?;

        debug!("Fetched {} update(s) from offset {}", updates.len(), offset);
        Ok(updates.iter().map(to_inbound_event).collect())
    }

    async fn resolve_content_path(&self, file_id: &str) -> Result<String> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(request_error)?;
        Ok(file.path)
    }

    async fn download_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.bot
            .download_file(path, &mut buf)
            .await
            .map_err(download_error)?;
        debug!("Downloaded {} ({} bytes)", path, buf.len());
        Ok(buf)
    }

    async fn send_text(&self, chat_id: i64, text: &str, button: Option<&LinkButton>) -> Result<()> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(button) = button {
            let url = reqwest::Url::parse(&button.url)
                .map_err(|e| RelayError::Config(format!("invalid button URL '{}': {}", button.url, e)))?;
            request = request.reply_markup(InlineKeyboardMarkup::new([[
                InlineKeyboardButton::url(button.text.clone(), url),
            ]]));
        }
        request.await.map_err(request_error)?;
        Ok(())
    }

    async fn send_reaction(&self, chat_id: i64, message_id: i32, emoji: &str) -> Result<()> {
        self.bot
            .set_message_reaction(ChatId(chat_id), MessageId(message_id))
            .reaction(vec![ReactionType::Emoji {
                emoji: emoji.to_string(),
            }])
            .await
            .map_err(request_error)?;
        Ok(())
    }
}
