use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::Storage;
use crate::config::NextcloudConfig;
use crate::error::{RelayError, Result};

const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// Public-share WebDAV folder on a Nextcloud server.
pub struct NextcloudStorage {
    client: reqwest::Client,
    folder: Url,
    share_password: Option<String>,
    upload_timeout: Duration,
}

impl NextcloudStorage {
    pub fn new(config: &NextcloudConfig) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            folder: folder_url(&config.base_url, &config.share_id, &config.upload_dir)?,
            share_password: config.share_password.clone(),
            upload_timeout: config.upload_timeout,
        })
    }

    pub fn folder(&self) -> &Url {
        &self.folder
    }

    fn file_url(&self, name: &str) -> Url {
        let mut url = self.folder.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(name);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.share_password {
            Some(password) => request.basic_auth("anonymous", Some(password)),
            None => request,
        }
    }
}

/// `{base}/public.php/dav/files/{share}/{upload_dir}` with every segment encoded.
pub fn folder_url(base: &Url, share_id: &str, upload_dir: &str) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            RelayError::Config(format!("storage base URL '{}' cannot hold a path", base))
        })?;
        segments
            .pop_if_empty()
            .extend(["public.php", "dav", "files", share_id]);
        segments.extend(upload_dir.split('/').filter(|s| !s.is_empty()));
    }
    Ok(url)
}

/// Map a refused upload to an error. Size refusals are reported apart from
/// other rejections.
pub fn classify_upload_rejection(status: StatusCode, body: &str) -> RelayError {
    let lower = body.to_ascii_lowercase();
    let mentions_size = ["too large", "too big", "size", "quota"]
        .iter()
        .any(|hint| lower.contains(hint));

    if status == StatusCode::PAYLOAD_TOO_LARGE
        || (status == StatusCode::BAD_REQUEST && mentions_size)
    {
        RelayError::Oversized(format!("storage refused upload ({})", status))
    } else {
        RelayError::Remote {
            status: status.as_u16(),
            message: body.chars().take(200).collect(),
        }
    }
}

#[async_trait]
impl Storage for NextcloudStorage {
    async fn exists(&self, name: &str) -> Result<bool> {
        let response = self
            .authorize(self.client.head(self.file_url(name)))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        debug!("HEAD {} -> {}", name, status);
        Ok(status == StatusCode::OK)
    }

    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let size = bytes.len();
        let response = self
            .authorize(self.client.put(self.file_url(name)))
            .timeout(self.upload_timeout)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("PUT {} ({} bytes) -> {}", name, size, status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_upload_rejection(status, &body))
    }
}
