//! Cancellable background polling
//!
//! A poller re-runs a fetch on a fixed interval and forwards each result
//! through a channel until a terminal value arrives, [`PollHandle::stop`] is
//! called, or the handle is dropped.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::ApiError;

/// Capacity of the update channel
const UPDATE_BUFFER: usize = 8;

/// Handle to a running poller
pub struct PollHandle<T> {
    updates: mpsc::Receiver<Result<T, ApiError>>,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T> PollHandle<T> {
    /// Wait for the next polled result; `None` once polling has ended
    pub async fn next(&mut self) -> Option<Result<T, ApiError>> {
        self.updates.recv().await
    }

    /// Stop polling. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Whether polling has ended, by request or because a terminal value arrived
    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled() || self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Stop polling and wait for the background task to exit
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::debug!("Poll task ended abnormally: {}", e);
            }
        }
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Spawn a poller.
///
/// The first fetch happens one `interval` after spawning; callers already hold
/// the current value. Polling ends after a value for which `is_terminal`
/// returns true, or after an authentication failure. Other errors are
/// forwarded and polling continues.
pub fn spawn_poller<T, F, Fut>(
    interval: Duration,
    fetch: F,
    is_terminal: fn(&T) -> bool,
) -> PollHandle<T>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send,
{
    let interval = interval.max(Duration::from_millis(1));
    let (tx, updates) = mpsc::channel(UPDATE_BUFFER);
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                _ = token.cancelled() => break,
                result = fetch() => result,
            };

            let finished = match &result {
                Ok(value) => is_terminal(value),
                Err(e) => e.requires_reauth(),
            };

            tokio::select! {
                _ = token.cancelled() => break,
                sent = tx.send(result) => {
                    // receiver dropped
                    if sent.is_err() {
                        break;
                    }
                }
            }

            if finished {
                break;
            }
        }

        token.cancel();
        tracing::debug!("Poller stopped");
    });

    PollHandle { updates, cancel_token, task: Some(task) }
}
