mod bot;
mod config;
mod error;
mod filename;
mod platform;
mod relay;
mod router;
mod storage;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;
use crate::platform::telegram::TelegramMessenger;
use crate::storage::nextcloud::NextcloudStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,filerelay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => info!("No .env file found, using process environment"),
        Err(e) => warn!("Failed to read .env file: {}", e),
    }

    let config = Config::from_env().context("Failed to load configuration from environment")?;

    info!("Configuration loaded successfully");
    info!("  Mode: {}", config.mode);
    info!("  Logs chat: {}", config.telegram.logs_chat_id);
    info!("  Upload directory: {}", config.nextcloud.upload_dir);

    let messenger =
        TelegramMessenger::new(&config.telegram).context("Failed to create Telegram client")?;
    let storage =
        NextcloudStorage::new(&config.nextcloud).context("Failed to create storage client")?;
    info!("  Storage host: {}", storage.folder().host_str().unwrap_or("?"));

    let state = Arc::new(AppState::new(config, Box::new(messenger), Box::new(storage)));

    info!("Bot is starting...");
    bot::run(state).await?;

    Ok(())
}
