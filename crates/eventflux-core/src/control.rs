//! The handle returned by [`EventFlux::on`](crate::EventFlux::on).

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::debug;

use crate::debounce::Debounce;
use crate::error::FluxResult;
use crate::flux::Inner;
use crate::limiter::InvokeLimit;
use crate::middleware::Middleware;
use crate::registration::{HandlerId, Registration};

/// Live control over one registered handler.
///
/// The handle shares its state with the engine; every change applies to the
/// next emission that reaches the handler. It keeps working after
/// [`off`](Self::off), but the handler can no longer be reached.
pub struct ControlHandle<P, R> {
    registration: Arc<Registration<P, R>>,
    engine: Weak<Inner<P, R>>,
}

impl<P, R> Clone for ControlHandle<P, R> {
    fn clone(&self) -> Self {
        Self {
            registration: Arc::clone(&self.registration),
            engine: Weak::clone(&self.engine),
        }
    }
}

impl<P, R> ControlHandle<P, R> {
    pub(crate) fn new(registration: Arc<Registration<P, R>>, engine: Weak<Inner<P, R>>) -> Self {
        Self {
            registration,
            engine,
        }
    }

    /// The handler's id.
    pub fn id(&self) -> HandlerId {
        self.registration.id()
    }

    /// The event the handler is registered under.
    pub fn event(&self) -> &str {
        self.registration.event()
    }

    /// Stops the handler from running.
    ///
    /// A queue drain in progress stops at its next step and rejects every
    /// waiting atomic response with [`FluxError::Frozen`](crate::FluxError::Frozen).
    /// An invocation already running is not interrupted.
    pub fn freeze(&self) {
        self.registration.set_frozen(true);
        debug!(handler = %self.id(), "handler frozen");
    }

    /// Lets the handler run again. Queue entries abandoned by the freeze stay
    /// abandoned.
    pub fn unfreeze(&self) {
        self.registration.set_frozen(false);
        debug!(handler = %self.id(), "handler unfrozen");
    }

    pub fn is_frozen(&self) -> bool {
        self.registration.is_frozen()
    }

    /// Appends a middleware to the end of the chain.
    pub fn use_middleware(&self, middleware: Middleware<P>) {
        self.registration.state.lock().middlewares.push(middleware);
    }

    /// Appends several middlewares, in order.
    pub fn use_middlewares(&self, middlewares: impl IntoIterator<Item = Middleware<P>>) {
        self.registration
            .state
            .lock()
            .middlewares
            .extend(middlewares);
    }

    /// Turns per-handler queuing on or off.
    ///
    /// Switching to the current state does nothing. Switching off discards the
    /// waiting entries; their atomic responses resolve to
    /// [`FluxError::Abandoned`](crate::FluxError::Abandoned).
    pub fn toggle_queue(&self, enabled: bool) {
        let mut state = self.registration.state.lock();
        if state.queue.is_some() == enabled {
            return;
        }
        state.set_queue(enabled);
        drop(state);
        debug!(handler = %self.id(), enabled, "queue toggled");
    }

    /// Replaces the debounce window. `None` or a zero duration removes it.
    ///
    /// A delivery waiting on the old window is cancelled.
    pub fn update_debounce(&self, interval: Option<Duration>) {
        let debounce = interval
            .filter(|interval| !interval.is_zero())
            .map(Debounce::new);
        // The old window is dropped here, which cancels its timer.
        self.registration.state.lock().debounce = debounce;
        debug!(handler = %self.id(), ?interval, "debounce updated");
    }

    /// Installs a new invocation budget. `None` is unlimited, `Some(0)` is
    /// exhausted.
    pub fn update_invoke_limit(&self, limit: Option<u32>) {
        self.registration.state.lock().limit.reset(limit);
        debug!(handler = %self.id(), ?limit, "invoke limit updated");
    }

    /// The current invocation budget.
    pub fn invoke_limit(&self) -> InvokeLimit {
        self.registration.state.lock().limit
    }

    /// The current debounce window, if any.
    pub fn debounce_interval(&self) -> Option<Duration> {
        self.registration
            .state
            .lock()
            .debounce
            .as_ref()
            .map(Debounce::interval)
    }

    /// Returns `true` while a debounced delivery is waiting for its window.
    pub fn debounce_pending(&self) -> bool {
        self.registration
            .state
            .lock()
            .debounce
            .as_ref()
            .is_some_and(Debounce::is_armed)
    }

    /// Number of emissions waiting in the handler queue, or `None` when the
    /// handler is not queued.
    pub fn queued(&self) -> Option<usize> {
        self.registration.state.lock().queue.as_ref().map(|q| q.len())
    }

    /// Removes the handler from the engine.
    pub fn off(&self) -> FluxResult<()> {
        match self.engine.upgrade() {
            Some(inner) => inner.remove_handler(self.registration.event(), self.id()),
            None => Ok(()),
        }
    }
}

impl<P, R> fmt::Debug for ControlHandle<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlHandle")
            .field("registration", &self.registration)
            .finish_non_exhaustive()
    }
}
