//! Handler registrations and the options they are created with.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::debounce::Debounce;
use crate::handler::Handler;
use crate::limiter::InvokeLimit;
use crate::middleware::Middleware;
use crate::queue::HandlerQueue;

/// Engine-unique identifier of a handler registration.
///
/// Returned by [`ControlHandle::id`](crate::ControlHandle::id) and used to
/// remove the handler with [`EventFlux::off`](crate::EventFlux::off).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) u64);

impl HandlerId {
    /// The raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery policies of a handler, fixed at registration time.
///
/// Everything here except `priority` can later be changed through the
/// [`ControlHandle`](crate::ControlHandle).
///
/// ```rust,ignore
/// let options = HandlerOptions::new()
///     .middleware(Middleware::sync(|_, q: &mut String| !q.is_empty()))
///     .debounce(Duration::from_millis(300))
///     .with_queue();
/// ```
pub struct HandlerOptions<P> {
    pub(crate) middlewares: Vec<Middleware<P>>,
    pub(crate) invoke_limit: Option<u32>,
    pub(crate) with_queue: bool,
    pub(crate) debounce: Option<Duration>,
    pub(crate) priority: Option<i32>,
}

impl<P> Default for HandlerOptions<P> {
    fn default() -> Self {
        Self {
            middlewares: Vec::new(),
            invoke_limit: None,
            with_queue: false,
            debounce: None,
            priority: None,
        }
    }
}

impl<P> HandlerOptions<P> {
    /// Options with no policies: unlimited, unqueued, undebounced, unprioritised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware to the chain.
    pub fn middleware(mut self, middleware: Middleware<P>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Appends several middlewares, in order.
    pub fn middlewares(mut self, middlewares: impl IntoIterator<Item = Middleware<P>>) -> Self {
        self.middlewares.extend(middlewares);
        self
    }

    /// Caps the number of invocations. `0` means unlimited.
    pub fn invoke_limit(mut self, limit: u32) -> Self {
        self.invoke_limit = Some(limit);
        self
    }

    /// Delivers emissions one at a time, in emission order.
    pub fn with_queue(mut self) -> Self {
        self.with_queue = true;
        self
    }

    /// Coalesces bursts: only the last emission of each `interval` window
    /// is delivered. A zero interval disables debouncing.
    pub fn debounce(mut self, interval: Duration) -> Self {
        self.debounce = Some(interval);
        self
    }

    /// Orders the handler among the others of its event; lower runs first.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

impl<P> fmt::Debug for HandlerOptions<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerOptions")
            .field("middlewares", &self.middlewares.len())
            .field("invoke_limit", &self.invoke_limit)
            .field("with_queue", &self.with_queue)
            .field("debounce", &self.debounce)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Mutable per-handler state, guarded by the registration's mutex.
pub(crate) struct HandlerState<P, R> {
    pub middlewares: Vec<Middleware<P>>,
    pub limit: InvokeLimit,
    pub debounce: Option<Debounce>,
    pub queue: Option<HandlerQueue<P, R>>,
    /// Bumped whenever the queue is replaced, so a drain loop of a previous
    /// queue notices it is stale.
    pub queue_epoch: u64,
}

impl<P, R> HandlerState<P, R> {
    pub fn set_queue(&mut self, enabled: bool) {
        self.queue_epoch += 1;
        self.queue = enabled.then(|| HandlerQueue::new(self.queue_epoch));
    }
}

/// A handler bound to an event name.
pub(crate) struct Registration<P, R> {
    id: HandlerId,
    event: String,
    priority: Option<i32>,
    pub handler: Handler<P, R>,
    frozen: AtomicBool,
    pub state: Mutex<HandlerState<P, R>>,
}

impl<P, R> Registration<P, R> {
    pub fn new(
        id: HandlerId,
        event: String,
        handler: Handler<P, R>,
        options: HandlerOptions<P>,
    ) -> Self {
        let mut state = HandlerState {
            middlewares: options.middlewares,
            limit: InvokeLimit::new(options.invoke_limit),
            debounce: options
                .debounce
                .filter(|interval| !interval.is_zero())
                .map(Debounce::new),
            queue: None,
            queue_epoch: 0,
        };
        if options.with_queue {
            state.set_queue(true);
        }

        Self {
            id,
            event,
            priority: options.priority,
            handler,
            frozen: AtomicBool::new(false),
            state: Mutex::new(state),
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn set_frozen(&self, frozen: bool) {
        self.frozen.store(frozen, Ordering::Release);
    }

    /// Snapshot of the middleware chain, taken so no lock is held while it runs.
    pub fn middlewares(&self) -> Vec<Middleware<P>> {
        self.state.lock().middlewares.clone()
    }

    pub fn is_debounced(&self) -> bool {
        self.state.lock().debounce.is_some()
    }
}

impl<P, R> fmt::Debug for Registration<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("priority", &self.priority)
            .field("frozen", &self.is_frozen())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(options: HandlerOptions<u32>) -> Registration<u32, u32> {
        Registration::new(HandlerId(1), "tick".into(), Handler::sync(|n: u32| n), options)
    }

    #[test]
    fn test_options_build_state() {
        let reg = registration(
            HandlerOptions::new()
                .middleware(Middleware::sync(|_, _: &mut u32| true))
                .invoke_limit(3)
                .with_queue()
                .debounce(Duration::from_millis(10))
                .priority(-1),
        );

        let state = reg.state.lock();
        assert_eq!(state.middlewares.len(), 1);
        assert_eq!(state.limit.remaining(), Some(3));
        assert!(state.debounce.is_some());
        assert!(state.queue.is_some());
        assert_eq!(reg.priority(), Some(-1));
    }

    #[test]
    fn test_zero_debounce_is_ignored() {
        let reg = registration(HandlerOptions::new().debounce(Duration::ZERO));
        assert!(!reg.is_debounced());
    }

    #[test]
    fn test_freeze_flag() {
        let reg = registration(HandlerOptions::new());
        assert!(!reg.is_frozen());
        reg.set_frozen(true);
        assert!(reg.is_frozen());
        assert_eq!(reg.event(), "tick");
        assert_eq!(reg.id().to_string(), "1");
    }

    #[test]
    fn test_requeue_bumps_epoch() {
        let reg = registration(HandlerOptions::new().with_queue());
        let mut state = reg.state.lock();
        let first = state.queue_epoch;
        state.set_queue(false);
        assert!(state.queue.is_none());
        state.set_queue(true);
        assert!(state.queue_epoch > first);
    }
}
