//! In-memory transports and message fixtures shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RelayError, Result};
use crate::platform::{
    ChatInfo, ChatKind, InboundEvent, IncomingMessage, LinkButton, MediaAttachment, MediaKind,
    Messenger, Sender,
};
use crate::storage::Storage;

pub const TIMESTAMP: i64 = 1_700_000_000;

pub fn media(file_id: &str, file_name: Option<&str>) -> MediaAttachment {
    MediaAttachment {
        kind: MediaKind::Document,
        file_id: file_id.to_string(),
        file_name: file_name.map(str::to_string),
    }
}

fn message(username: &str, message_id: i32, text: Option<&str>, chat: ChatInfo) -> IncomingMessage {
    IncomingMessage {
        message_id,
        sender: Sender {
            first_name: Some("Test".to_string()),
            username: Some(username.to_string()),
        },
        chat,
        timestamp: TIMESTAMP,
        text: text.map(str::to_string),
        media: None,
    }
}

pub fn private_message(username: &str, message_id: i32, text: Option<&str>) -> IncomingMessage {
    message(
        username,
        message_id,
        text,
        ChatInfo {
            id: 1001,
            kind: ChatKind::Private,
        },
    )
}

pub fn group_message(username: &str, message_id: i32, text: Option<&str>) -> IncomingMessage {
    message(
        username,
        message_id,
        text,
        ChatInfo {
            id: -100_200,
            kind: ChatKind::Supergroup,
        },
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub chat_id: i64,
    pub text: String,
    pub button: Option<LinkButton>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReaction {
    pub chat_id: i64,
    pub message_id: i32,
    pub emoji: String,
}

/// Records every outbound call and serves scripted answers.
#[derive(Default)]
pub struct FakeMessenger {
    paths: Mutex<HashMap<String, String>>,
    too_big: Mutex<Vec<String>>,
    panics: Mutex<Vec<String>>,
    batches: Mutex<VecDeque<Result<Vec<InboundEvent>>>>,
    offsets: Mutex<Vec<u32>>,
    texts: Mutex<Vec<SentText>>,
    reactions: Mutex<Vec<SentReaction>>,
    pub downloads: AtomicUsize,
    fail_sends: AtomicBool,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(self, file_id: &str, path: &str) -> Self {
        self.paths
            .lock()
            .unwrap()
            .insert(file_id.to_string(), path.to_string());
        self
    }

    /// Make `resolve_content_path` reject this file as too big.
    pub fn with_too_big(self, file_id: &str) -> Self {
        self.too_big.lock().unwrap().push(file_id.to_string());
        self
    }

    /// Make `resolve_content_path` panic for this file.
    pub fn with_panic(self, file_id: &str) -> Self {
        self.panics.lock().unwrap().push(file_id.to_string());
        self
    }

    /// Queue the answer for the next fetch. With nothing queued a fetch
    /// waits out its long-poll timeout and returns an empty batch.
    pub fn push_batch(&self, batch: Result<Vec<InboundEvent>>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn offsets(&self) -> Vec<u32> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<SentText> {
        self.texts.lock().unwrap().clone()
    }

    /// Texts sent to any chat other than `logs_chat_id`.
    pub fn replies(&self, logs_chat_id: i64) -> Vec<SentText> {
        self.texts()
            .into_iter()
            .filter(|t| t.chat_id != logs_chat_id)
            .collect()
    }

    pub fn reactions(&self) -> Vec<SentReaction> {
        self.reactions.lock().unwrap().clone()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn fetch_updates(&self, offset: u32, timeout: Duration) -> Result<Vec<InboundEvent>> {
        self.offsets.lock().unwrap().push(offset);
        let queued = self.batches.lock().unwrap().pop_front();
        match queued {
            Some(batch) => batch,
            None => {
                tokio::time::sleep(timeout).await;
                Ok(Vec::new())
            }
        }
    }

    async fn resolve_content_path(&self, file_id: &str) -> Result<String> {
        let boom = self.panics.lock().unwrap().iter().any(|id| id == file_id);
        if boom {
            panic!("lookup of {} blew up", file_id);
        }
        if self.too_big.lock().unwrap().iter().any(|id| id == file_id) {
            return Err(RelayError::Oversized("file is too big".to_string()));
        }
        self.paths
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| RelayError::NotFound(file_id.to_string()))
    }

    async fn download_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("bytes of {}", path).into_bytes())
    }

    async fn send_text(&self, chat_id: i64, text: &str, button: Option<&LinkButton>) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(RelayError::Network("send failed".to_string()));
        }
        self.texts.lock().unwrap().push(SentText {
            chat_id,
            text: text.to_string(),
            button: button.cloned(),
        });
        Ok(())
    }

    async fn send_reaction(&self, chat_id: i64, message_id: i32, emoji: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(RelayError::Network("send failed".to_string()));
        }
        self.reactions.lock().unwrap().push(SentReaction {
            chat_id,
            message_id,
            emoji: emoji.to_string(),
        });
        Ok(())
    }
}

/// Storage kept in a map; uploads can be made to fail once.
#[derive(Default)]
pub struct FakeStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    next_upload_error: Mutex<Option<RelayError>>,
    probe_fails: AtomicBool,
    pub uploads: AtomicUsize,
    pub probes: AtomicUsize,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_upload(&self, error: RelayError) {
        *self.next_upload_error.lock().unwrap() = Some(error);
    }

    pub fn fail_probes(&self) {
        self.probe_fails.store(true, Ordering::SeqCst);
    }

    pub fn insert(&self, name: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), Vec::new());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.lock().unwrap().contains_key(name)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for FakeStorage {
    async fn exists(&self, name: &str) -> Result<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.probe_fails.load(Ordering::SeqCst) {
            return Err(RelayError::Remote {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        Ok(self.contains(name))
    }

    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_upload_error.lock().unwrap().take() {
            return Err(error);
        }
        self.files.lock().unwrap().insert(name.to_string(), bytes);
        Ok(())
    }
}
