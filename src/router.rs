use tracing::{debug, info};

use crate::config::{Config, RelayMode};
use crate::platform::{
    notify, ControlLog, InboundEvent, IncomingMessage, LinkButton, Messenger, Notice,
};
use crate::relay::{FeedbackStyle, Relay, RelayOutcome};
use crate::storage::Storage;

const START_COMMAND: &str = "/start";

const WELCOME_TEXT: &str = "Hello! I am the upload bot. Send me your photos, videos or \
                            documents and I will save them to the shared folder.";

const ASK_FOR_FILE_TEXT: &str =
    "Please send a photo, video or document and I will save it for you.";

/// What to do with one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Ignore,
    Welcome,
    /// Group mention: invite the sender to a private chat.
    Invite,
    AskForFile,
    Relay,
}

/// `/start`, `/start <payload>` and `/start@botname`.
pub fn is_start_command(text: &str) -> bool {
    let text = text.trim();
    text == START_COMMAND
        || text
            .strip_prefix(START_COMMAND)
            .is_some_and(|rest| rest.starts_with(' ') || rest.starts_with('@'))
}

/// Case-insensitive match of `token` as a whole word in `text`.
pub fn mentions(text: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let text = text.to_lowercase();
    let token = token.to_lowercase();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    text.match_indices(&token).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + token.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Classify a message. Media is routed first, except that a start command in
/// a private chat always gets the welcome. Text replies come after that.
pub fn classify(message: &IncomingMessage, mode: RelayMode, mention: Option<&str>) -> Route {
    let text = message.text.as_deref().unwrap_or("");
    let is_start = is_start_command(text);

    if message.media.is_some() {
        if is_start && message.chat.is_private() {
            return Route::Welcome;
        }
        return match mode {
            RelayMode::Direct => Route::Relay,
            RelayMode::RedirectToPrivate if message.chat.is_private() => Route::Relay,
            RelayMode::RedirectToPrivate => Route::Ignore,
        };
    }

    if is_start {
        return Route::Welcome;
    }

    if mode == RelayMode::RedirectToPrivate
        && message.chat.is_group()
        && mention.is_some_and(|token| mentions(text, token))
    {
        return Route::Invite;
    }

    if message.chat.is_private() {
        return Route::AskForFile;
    }

    Route::Ignore
}

pub fn deep_link(bot_username: &str) -> String {
    format!("https://t.me/{}?start=upload", bot_username)
}

/// Routes events to canned replies or the relay pipeline.
pub struct Router<'a> {
    config: &'a Config,
    messenger: &'a dyn Messenger,
    storage: &'a dyn Storage,
}

impl<'a> Router<'a> {
    pub fn new(config: &'a Config, messenger: &'a dyn Messenger, storage: &'a dyn Storage) -> Self {
        Self {
            config,
            messenger,
            storage,
        }
    }

    fn control(&self) -> ControlLog<'a> {
        ControlLog::new(self.messenger, self.config.telegram.logs_chat_id)
    }

    fn feedback_style(&self) -> FeedbackStyle {
        match self.config.mode {
            RelayMode::Direct => FeedbackStyle::Reaction,
            RelayMode::RedirectToPrivate => FeedbackStyle::Text,
        }
    }

    /// Handle one event. Never fails: relay failures are reported to the
    /// sender and the control channel.
    pub async fn dispatch(&self, event: &InboundEvent) -> Route {
        let Some(message) = event.message.as_ref() else {
            debug!("Update {} carries no message", event.update_id);
            return Route::Ignore;
        };

        let mention = self.config.mention_token();
        let route = classify(message, self.config.mode, mention.as_deref());
        let sender = message.sender.display_handle();
        let chat_id = message.chat.id;

        match route {
            Route::Ignore => {}
            Route::Welcome => {
                self.control()
                    .log(format!("[/START] New user: @{} in chat {}", sender, chat_id))
                    .await;
                self.reply(chat_id, WELCOME_TEXT, None).await;
            }
            Route::Invite => {
                self.control()
                    .log(format!("[MENTION] @{} mentioned the bot in chat {}", sender, chat_id))
                    .await;
                self.invite(chat_id).await;
            }
            Route::AskForFile => {
                info!("Private message without media from @{}", sender);
                self.reply(chat_id, ASK_FOR_FILE_TEXT, None).await;
            }
            Route::Relay => {
                if let Some(media) = message.media.as_ref() {
                    info!("[MEDIA] {:?} received from @{} in chat {}", media.kind, sender, chat_id);
                    let outcome = Relay::new(
                        self.messenger,
                        self.storage,
                        self.control(),
                        self.feedback_style(),
                    )
                    .run(message, media)
                    .await;
                    if let RelayOutcome::Failed { cause, .. } = &outcome {
                        debug!("Relay for message {} failed: {}", message.message_id, cause);
                    }
                }
            }
        }

        route
    }

    async fn invite(&self, chat_id: i64) {
        let Some(username) = self.config.telegram.bot_username.as_deref() else {
            return;
        };
        let link = deep_link(username);
        let text = format!(
            "To send me files, continue in a private chat: {}\nPhotos, videos and documents sent there are saved automatically.",
            link
        );
        let button = LinkButton {
            text: "Open private chat".to_string(),
            url: link,
        };
        self.reply(chat_id, &text, Some(button)).await;
    }

    async fn reply(&self, chat_id: i64, text: &str, button: Option<LinkButton>) {
        notify(
            self.messenger,
            chat_id,
            Notice::Text {
                text: text.to_string(),
                button,
            },
        )
        .await;
    }
}
