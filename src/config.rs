use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ::config::{Environment, Map};
use serde::Deserialize;

use crate::error::{RelayError, Result};

/// How media posted outside a private chat is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayMode {
    /// Media is relayed wherever it is posted; feedback is a reaction.
    #[default]
    Direct,
    /// Only private-chat media is relayed; group mentions get an invitation
    /// to continue in private, and feedback is a text reply.
    RedirectToPrivate,
}

impl FromStr for RelayMode {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(RelayMode::Direct),
            "redirect" | "redirect-to-private" => Ok(RelayMode::RedirectToPrivate),
            other => Err(RelayError::Config(format!(
                "RELAY_MODE must be 'direct' or 'redirect-to-private', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayMode::Direct => write!(f, "direct"),
            RelayMode::RedirectToPrivate => write!(f, "redirect-to-private"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat receiving the control log lines.
    pub logs_chat_id: i64,
    /// Bot username without the leading `@`.
    pub bot_username: Option<String>,
    pub poll_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct NextcloudConfig {
    pub base_url: reqwest::Url,
    pub share_id: String,
    pub upload_dir: String,
    pub share_password: Option<String>,
    pub upload_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub nextcloud: NextcloudConfig,
    pub mode: RelayMode,
    pub network_retry_delay: Duration,
    pub failure_retry_delay: Duration,
}

/// Flat view of the process environment. Keys are the lower-cased variable
/// names, e.g. `BOT_API_KEY` -> `bot_api_key`.
#[derive(Debug, Deserialize)]
struct EnvSettings {
    bot_api_key: Option<String>,
    bot_logs_chat_id: Option<i64>,
    nextcloud_base_url: Option<String>,
    nextcloud_share_id: Option<String>,
    nextcloud_upload_dir: Option<String>,

    relay_mode: Option<String>,
    bot_username: Option<String>,
    nextcloud_share_password: Option<String>,

    #[serde(default = "default_poll_timeout_secs")]
    poll_timeout_secs: u64,
    #[serde(default = "default_network_retry_secs")]
    network_retry_delay_secs: u64,
    #[serde(default = "default_failure_retry_secs")]
    failure_retry_delay_secs: u64,
    #[serde(default = "default_upload_timeout_secs")]
    upload_timeout_secs: u64,
}

fn default_poll_timeout_secs() -> u64 {
    100
}

fn default_network_retry_secs() -> u64 {
    30
}

fn default_failure_retry_secs() -> u64 {
    60
}

fn default_upload_timeout_secs() -> u64 {
    300
}

/// Whitespace-only values count as unset.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load from the process environment. Call `dotenvy::dotenv()` first to
    /// pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::default())
    }

    /// Load from an explicit set of variables instead of the process
    /// environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Environment::default().source(Some(source)))
    }

    fn load(environment: Environment) -> Result<Self> {
        let settings: EnvSettings = ::config::Config::builder()
            .add_source(environment.ignore_empty(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| RelayError::Config(format!("invalid settings: {}", e)))?;

        Self::from_settings(settings)
    }

    fn from_settings(settings: EnvSettings) -> Result<Self> {
        let bot_token = present(settings.bot_api_key);
        let base_url = present(settings.nextcloud_base_url);
        let share_id = present(settings.nextcloud_share_id);
        let upload_dir = present(settings.nextcloud_upload_dir);

        let missing: Vec<&str> = [
            ("BOT_API_KEY", bot_token.is_none()),
            ("BOT_LOGS_CHAT_ID", settings.bot_logs_chat_id.is_none()),
            ("NEXTCLOUD_BASE_URL", base_url.is_none()),
            ("NEXTCLOUD_SHARE_ID", share_id.is_none()),
            ("NEXTCLOUD_UPLOAD_DIR", upload_dir.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        let (Some(bot_token), Some(logs_chat_id), Some(base_url), Some(share_id), Some(upload_dir)) = (
            bot_token,
            settings.bot_logs_chat_id,
            base_url,
            share_id,
            upload_dir,
        ) else {
            return Err(RelayError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        };

        let base_url = reqwest::Url::parse(&base_url)
            .map_err(|e| RelayError::Config(format!("NEXTCLOUD_BASE_URL is not a URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RelayError::Config(
                "NEXTCLOUD_BASE_URL must be an absolute http(s) URL".to_string(),
            ));
        }

        let mode = match present(settings.relay_mode) {
            Some(raw) => raw.parse()?,
            None => RelayMode::default(),
        };

        let bot_username =
            present(settings.bot_username).map(|u| u.trim_start_matches('@').to_string());
        if mode == RelayMode::RedirectToPrivate && bot_username.is_none() {
            return Err(RelayError::Config(
                "BOT_USERNAME is required when RELAY_MODE is redirect-to-private".to_string(),
            ));
        }

        Ok(Config {
            telegram: TelegramConfig {
                bot_token,
                logs_chat_id,
                bot_username,
                poll_timeout: Duration::from_secs(settings.poll_timeout_secs),
            },
            nextcloud: NextcloudConfig {
                base_url,
                share_id,
                upload_dir,
                share_password: present(settings.nextcloud_share_password),
                upload_timeout: Duration::from_secs(settings.upload_timeout_secs),
            },
            mode,
            network_retry_delay: Duration::from_secs(settings.network_retry_delay_secs),
            failure_retry_delay: Duration::from_secs(settings.failure_retry_delay_secs),
        })
    }

    /// Mention token users write in groups to reach the bot, e.g. `@mybot`.
    pub fn mention_token(&self) -> Option<String> {
        self.telegram
            .bot_username
            .as_ref()
            .map(|name| format!("@{}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base_env() -> HashMap<String, String> {
        env(&[
            ("BOT_API_KEY", "123:abc"),
            ("BOT_LOGS_CHAT_ID", "-1001"),
            ("NEXTCLOUD_BASE_URL", "https://cloud.example.org"),
            ("NEXTCLOUD_SHARE_ID", "s3cr3t"),
            ("NEXTCLOUD_UPLOAD_DIR", "Photos2025"),
        ])
    }

    fn load(vars: &HashMap<String, String>) -> Result<Config> {
        Config::from_vars(vars.clone())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.mode, RelayMode::Direct);
        assert_eq!(config.telegram.logs_chat_id, -1001);
        assert_eq!(config.telegram.poll_timeout, Duration::from_secs(100));
        assert_eq!(config.network_retry_delay, Duration::from_secs(30));
        assert_eq!(config.failure_retry_delay, Duration::from_secs(60));
        assert_eq!(config.nextcloud.upload_timeout, Duration::from_secs(300));
        assert!(config.nextcloud.share_password.is_none());
        assert!(config.mention_token().is_none());
    }

    #[test]
    fn test_missing_keys_are_all_reported() {
        let mut vars = base_env();
        vars.remove("BOT_API_KEY");
        vars.insert("NEXTCLOUD_SHARE_ID".into(), "   ".into());
        let err = load(&vars).unwrap_err().to_string();
        assert!(err.contains("BOT_API_KEY"));
        assert!(err.contains("NEXTCLOUD_SHARE_ID"));
        assert!(!err.contains("BOT_LOGS_CHAT_ID"));
    }

    #[test]
    fn test_invalid_chat_id() {
        let mut vars = base_env();
        vars.insert("BOT_LOGS_CHAT_ID".into(), "logs".into());
        assert!(matches!(load(&vars), Err(RelayError::Config(_))));
    }

    #[test]
    fn test_redirect_mode_requires_username() {
        let mut vars = base_env();
        vars.insert("RELAY_MODE".into(), "redirect-to-private".into());
        assert!(load(&vars).is_err());

        vars.insert("BOT_USERNAME".into(), "@mybot".into());
        let config = load(&vars).unwrap();
        assert_eq!(config.mode, RelayMode::RedirectToPrivate);
        assert_eq!(config.mention_token().as_deref(), Some("@mybot"));
    }

    #[test]
    fn test_empty_optional_values_use_defaults() {
        let mut vars = base_env();
        vars.insert("RELAY_MODE".into(), "".into());
        vars.insert("NEXTCLOUD_SHARE_PASSWORD".into(), "".into());
        vars.insert("POLL_TIMEOUT_SECS".into(), "".into());
        let config = load(&vars).unwrap();
        assert_eq!(config.mode, RelayMode::Direct);
        assert!(config.nextcloud.share_password.is_none());
        assert_eq!(config.telegram.poll_timeout, Duration::from_secs(100));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let mut vars = base_env();
        vars.insert("RELAY_MODE".into(), "broadcast".into());
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_duration_overrides() {
        let mut vars = base_env();
        vars.insert("POLL_TIMEOUT_SECS".into(), "25".into());
        vars.insert("NETWORK_RETRY_DELAY_SECS".into(), "5".into());
        let config = load(&vars).unwrap();
        assert_eq!(config.telegram.poll_timeout, Duration::from_secs(25));
        assert_eq!(config.network_retry_delay, Duration::from_secs(5));

        vars.insert("UPLOAD_TIMEOUT_SECS".into(), "soon".into());
        assert!(load(&vars).is_err());
    }
}
