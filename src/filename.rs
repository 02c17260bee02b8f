use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::platform::{IncomingMessage, MediaAttachment};

/// Characters that are not allowed in a stored filename.
const UNSAFE_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

static TRAILING_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\w+$").expect("extension pattern is valid"));

/// Strip path-unsafe and control characters.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !UNSAFE_CHARS.contains(c) && !c.is_control())
        .collect()
}

/// Sender label used in stored names: handle, else given name, else `Anonymous`.
pub fn sender_label(message: &IncomingMessage) -> String {
    let label = sanitize(message.sender.display_handle());
    if label.trim().is_empty() {
        "Anonymous".to_string()
    } else {
        label
    }
}

/// Build `{timestamp}-{sender}-{message_id}[-{declared name}]` and make sure
/// the result carries an extension, borrowing the one from `remote_path` when
/// the assembled name has none.
pub fn derive(message: &IncomingMessage, media: &MediaAttachment, remote_path: &str) -> String {
    let mut name = format!(
        "{}-{}-{}",
        message.timestamp,
        sender_label(message),
        message.message_id
    );

    if let Some(declared) = media.file_name.as_deref().map(sanitize) {
        if !declared.is_empty() {
            name.push('-');
            name.push_str(&declared);
        }
    }

    if !TRAILING_EXTENSION.is_match(&name) {
        if let Some(ext) = remote_extension(remote_path) {
            name.push('.');
            name.push_str(&ext);
        }
    }

    name
}

fn remote_extension(remote_path: &str) -> Option<String> {
    Path::new(remote_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(sanitize)
        .filter(|ext| !ext.is_empty())
}
