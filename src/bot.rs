use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::RelayError;
use crate::platform::{ControlLog, Messenger};
use crate::router::Router;
use crate::storage::Storage;

/// Offset for the next fetch: one past the highest update id dispatched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    next_offset: u32,
}

impl Watermark {
    pub fn offset(&self) -> u32 {
        self.next_offset
    }

    pub fn advance(&mut self, update_id: u32) {
        self.next_offset = self.next_offset.max(update_id.saturating_add(1));
    }
}

/// Shared application state
pub struct AppState {
    pub config: Config,
    messenger: Box<dyn Messenger>,
    storage: Box<dyn Storage>,
}

impl AppState {
    pub fn new(config: Config, messenger: Box<dyn Messenger>, storage: Box<dyn Storage>) -> Self {
        Self {
            config,
            messenger,
            storage,
        }
    }

    fn control(&self) -> ControlLog<'_> {
        ControlLog::new(self.messenger.as_ref(), self.config.telegram.logs_chat_id)
    }

    fn router(&self) -> Router<'_> {
        Router::new(&self.config, self.messenger.as_ref(), self.storage.as_ref())
    }
}

/// Fetch one batch and dispatch it in update order. Returns the batch size.
///
/// The watermark moves past every event handed to the router, including
/// events whose handling failed or panicked; those have already reported
/// back to their sender.
pub async fn poll_once(state: &AppState, watermark: &mut Watermark) -> Result<usize, RelayError> {
    let mut events = state
        .messenger
        .fetch_updates(watermark.offset(), state.config.telegram.poll_timeout)
        .await?;
    events.sort_by_key(|event| event.update_id);

    let router = state.router();
    for event in &events {
        let handled = AssertUnwindSafe(router.dispatch(event)).catch_unwind().await;
        if handled.is_err() {
            error!("Handler panicked on update {}", event.update_id);
            state
                .control()
                .log(format!(
                    "CRITICAL ERROR while handling update {}. Moving on.",
                    event.update_id
                ))
                .await;
        }
        watermark.advance(event.update_id);
    }

    Ok(events.len())
}

/// Pause before the next poll after a failed fetch.
pub fn retry_delay(config: &Config, error: &RelayError) -> Duration {
    if error.is_transient() {
        config.network_retry_delay
    } else {
        config.failure_retry_delay
    }
}

/// Run the poll loop until Ctrl-C.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    run_until(state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Run the poll loop until `shutdown` completes.
pub async fn run_until<F>(state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let control = state.control();
    control
        .log(format!("--- RELAY STARTED (mode={}) ---", state.config.mode))
        .await;

    tokio::pin!(shutdown);
    let mut watermark = Watermark::default();

    loop {
        let result = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            result = poll_once(&state, &mut watermark) => result,
        };

        let error = match result {
            Ok(count) => {
                if count > 0 {
                    info!("Handled {} update(s), next offset {}", count, watermark.offset());
                }
                continue;
            }
            Err(e) => e,
        };

        let delay = retry_delay(&state.config, &error);
        let kind = if error.is_transient() {
            "NETWORK ERROR"
        } else {
            "CRITICAL ERROR IN MAIN LOOP"
        };
        control
            .log(format!(
                "{}: {}. Retrying in {} seconds.",
                kind,
                error,
                delay.as_secs()
            ))
            .await;

        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    control.log("--- RELAY STOPPED ---").await;
    Ok(())
}
