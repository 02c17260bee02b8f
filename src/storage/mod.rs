pub mod nextcloud;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;

/// Destination of relayed files.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Probe for `name` in the upload directory.
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Store `bytes` under `name` in the upload directory.
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Existence check in front of uploads.
///
/// Only a definitive "found" answer counts as a duplicate. A failed or
/// ambiguous probe lets the upload go ahead, so a file is at worst stored twice
/// and never silently dropped.
pub struct DuplicateGuard<'a> {
    storage: &'a dyn Storage,
}

impl<'a> DuplicateGuard<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    pub async fn is_duplicate(&self, name: &str) -> bool {
        match self.storage.exists(name).await {
            Ok(found) => {
                debug!("Existence probe for '{}': {}", name, found);
                found
            }
            Err(e) => {
                warn!("Existence probe for '{}' failed, uploading anyway: {}", name, e);
                false
            }
        }
    }
}
