//! Debounce timers.
//!
//! A debounced handler does not run on every emission. Each emission re-arms
//! the handler's timer; only the emission that lets the timer run out is
//! delivered, and everything that came before it in the window is dropped.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Debounce configuration and the handle of the timer currently armed.
#[derive(Debug)]
pub struct Debounce {
    interval: Duration,
    pending: Option<CancellationToken>,
}

impl Debounce {
    /// Creates a debounce window of `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
        }
    }

    /// The configured window.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` while a delivery is waiting for its timer.
    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Cancels any armed timer and arms a new one that runs `action` when
    /// `interval` elapses without another call.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let token = CancellationToken::new();
        self.pending = Some(token.clone());
        let interval = self.interval;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!("debounced delivery superseded");
                }
                _ = tokio::time::sleep(interval) => {
                    // Disarm before running so a late cancel has nothing to hit.
                    token.cancel();
                    action();
                }
            }
        });
    }

    /// Discards the pending delivery, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        self.cancel();
    }
}
