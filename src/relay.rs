use tracing::{debug, info};

use crate::error::{FailureCause, RelayError, Stage};
use crate::filename;
use crate::platform::{notify, ControlLog, IncomingMessage, MediaAttachment, Messenger, Notice};
use crate::storage::{DuplicateGuard, Storage};

/// How the sender is told about the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackStyle {
    /// Emoji reaction on the original message.
    Reaction,
    /// Text reply in the chat.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Uploaded {
        name: String,
    },
    /// A file with the derived name is already stored; nothing was transferred.
    Skipped {
        name: String,
    },
    Failed {
        /// Derived name, when the path lookup got far enough to compute it.
        name: Option<String>,
        cause: FailureCause,
        error: String,
    },
}

impl RelayOutcome {
    fn failed(name: Option<String>, stage: Stage, error: &RelayError) -> Self {
        RelayOutcome::Failed {
            name,
            cause: FailureCause::classify(stage, error),
            error: error.to_string(),
        }
    }
}

/// Moves one media item from the chat platform into storage.
///
/// Resolve path, derive name, skip if already stored, download, upload.
/// Every run ends with one notice to the origin chat and one control log line.
pub struct Relay<'a> {
    messenger: &'a dyn Messenger,
    storage: &'a dyn Storage,
    control: ControlLog<'a>,
    style: FeedbackStyle,
}

impl<'a> Relay<'a> {
    pub fn new(
        messenger: &'a dyn Messenger,
        storage: &'a dyn Storage,
        control: ControlLog<'a>,
        style: FeedbackStyle,
    ) -> Self {
        Self {
            messenger,
            storage,
            control,
            style,
        }
    }

    pub async fn run(&self, message: &IncomingMessage, media: &MediaAttachment) -> RelayOutcome {
        let outcome = self.transfer(message, media).await;
        self.report(message, media, &outcome).await;
        outcome
    }

    async fn transfer(&self, message: &IncomingMessage, media: &MediaAttachment) -> RelayOutcome {
        let remote_path = match self.messenger.resolve_content_path(&media.file_id).await {
            Ok(path) => path,
            Err(e) => return RelayOutcome::failed(None, Stage::ResolvingPath, &e),
        };

        let name = filename::derive(message, media, &remote_path);

        if DuplicateGuard::new(self.storage).is_duplicate(&name).await {
            return RelayOutcome::Skipped { name };
        }

        info!("Downloading {} for '{}'", remote_path, name);
        let bytes = match self.messenger.download_bytes(&remote_path).await {
            Ok(bytes) => bytes,
            Err(e) => return RelayOutcome::failed(Some(name), Stage::Downloading, &e),
        };

        info!("Uploading '{}' ({} bytes)", name, bytes.len());
        match self.storage.upload(&name, bytes).await {
            Ok(()) => RelayOutcome::Uploaded { name },
            Err(e) => RelayOutcome::failed(Some(name), Stage::Uploading, &e),
        }
    }

    async fn report(&self, message: &IncomingMessage, media: &MediaAttachment, outcome: &RelayOutcome) {
        let sender = message.sender.display_handle();
        let line = match outcome {
            RelayOutcome::Uploaded { name } => {
                format!("==> SUCCESS: '{}' from @{} was saved.", name, sender)
            }
            RelayOutcome::Skipped { name } => {
                format!("==> ALREADY EXISTS: '{}' from @{}. Skipping.", name, sender)
            }
            RelayOutcome::Failed { name, cause, error } => format!(
                "==> FAILED ({}): file '{}' from @{}: {}",
                cause,
                name.as_deref().unwrap_or(&media.file_id),
                sender,
                error
            ),
        };
        self.control.log(line).await;

        let notice = self.notice(message, media, outcome);
        debug!("Feedback for message {}: {:?}", message.message_id, notice);
        notify(self.messenger, message.chat.id, notice).await;
    }

    fn notice(&self, message: &IncomingMessage, media: &MediaAttachment, outcome: &RelayOutcome) -> Notice {
        match self.style {
            FeedbackStyle::Reaction => Notice::Reaction {
                message_id: message.message_id,
                emoji: reaction_for(outcome),
            },
            FeedbackStyle::Text => Notice::Text {
                text: reply_for(media, outcome),
                button: None,
            },
        }
    }
}

fn reaction_for(outcome: &RelayOutcome) -> &'static str {
    match outcome {
        RelayOutcome::Uploaded { .. } => "🎉",
        RelayOutcome::Skipped { .. } => "👍",
        RelayOutcome::Failed {
            cause: FailureCause::Unknown(_),
            ..
        } => "🤯",
        RelayOutcome::Failed { .. } => "😢",
    }
}

fn reply_for(media: &MediaAttachment, outcome: &RelayOutcome) -> String {
    match outcome {
        RelayOutcome::Uploaded { name } => format!("✅ Saved as {}. Thank you!", name),
        RelayOutcome::Skipped { name } => {
            format!("👍 This file was already saved as {}.", name)
        }
        RelayOutcome::Failed { name, cause, .. } => {
            let shown = media
                .file_name
                .as_deref()
                .or(name.as_deref())
                .unwrap_or("your file");
            let hint = match cause {
                FailureCause::Oversized => "the file is too large. Try a smaller file or a shorter video.",
                FailureCause::TransientNetwork => "a network problem got in the way. Please try again later.",
                FailureCause::RemoteRejection(_) => "the storage server refused it. Please try again later.",
                FailureCause::LookupFailure => "I could not fetch it from Telegram. Please send it again.",
                FailureCause::Unknown(_) => "something unexpected went wrong.",
            };
            format!("😢 Sorry, I could not save \"{}\": {}", shown, hint)
        }
    }
}
