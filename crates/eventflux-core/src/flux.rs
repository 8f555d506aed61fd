//! The engine handle and handler/interceptor registration.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::control::ControlHandle;
use crate::diagnostics::{Diagnostics, DiagnosticsConfig};
use crate::error::{FluxError, FluxResult};
use crate::handler::Handler;
use crate::interceptor::{Interceptor, InterceptorId};
use crate::listeners::ListenerHub;
use crate::pipeline::Pipeline;
use crate::registration::{HandlerId, HandlerOptions, Registration};
use crate::registry::{HandlerRegistry, InterceptorRegistry};

/// Shared state behind every clone of an [`EventFlux`].
pub(crate) struct Inner<P, R> {
    pub handlers: HandlerRegistry<P, R>,
    pub interceptors: InterceptorRegistry<P>,
    pub diagnostics: Diagnostics,
    next_id: AtomicU64,
}

impl<P, R> Inner<P, R> {
    fn new(diagnostics: Diagnostics) -> Self {
        Self {
            handlers: HandlerRegistry::default(),
            interceptors: InterceptorRegistry::default(),
            diagnostics,
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn pipeline<'a>(
        &'a self,
        registration: &'a Registration<P, R>,
        listeners: Option<&'a ListenerHub>,
    ) -> Pipeline<'a, P, R> {
        Pipeline {
            registration,
            interceptors: &self.interceptors,
            diagnostics: &self.diagnostics,
            listeners,
        }
    }

    pub fn remove_handler(&self, event: &str, id: HandlerId) -> FluxResult<()> {
        if self.handlers.remove(event, id) {
            debug!(event = %event, handler = %id, "handler removed");
            return Ok(());
        }
        self.diagnostics.fail(FluxError::UnknownHandler {
            event: event.to_owned(),
            id,
        })
    }
}

/// An in-process event bus.
///
/// `P` is the payload type delivered to handlers, `R` what handlers return.
/// The engine is a cheap handle: clones share the same registry.
///
/// # Example
///
/// ```rust,ignore
/// use eventflux_core::{EmitOptions, EventFlux, Handler, HandlerOptions};
///
/// let flux: EventFlux<String, usize> = EventFlux::new();
/// flux.on("search", Handler::sync(|q: String| q.len()), HandlerOptions::new());
///
/// let len = flux.emit("search", "rust".into(), EmitOptions::new().atomic())?;
/// assert_eq!(len, Some(4));
/// ```
pub struct EventFlux<P, R = ()> {
    pub(crate) inner: Arc<Inner<P, R>>,
}

impl<P, R> Clone for EventFlux<P, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, R> Default for EventFlux<P, R>
where
    P: Clone + Send + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R> EventFlux<P, R>
where
    P: Clone + Send + 'static,
    R: Send + 'static,
{
    /// Creates an engine that logs warnings and returns configuration errors.
    pub fn new() -> Self {
        Self::with_diagnostics(DiagnosticsConfig::default())
    }

    /// Creates an engine with the given suppression switches.
    pub fn with_diagnostics(config: DiagnosticsConfig) -> Self {
        Self {
            inner: Arc::new(Inner::new(Diagnostics::new(config))),
        }
    }

    /// The engine's diagnostic sink.
    pub fn diagnostics(&self) -> Diagnostics {
        self.inner.diagnostics
    }

    /// Registers `handler` for `event`.
    pub fn on(
        &self,
        event: impl Into<String>,
        handler: Handler<P, R>,
        options: HandlerOptions<P>,
    ) -> ControlHandle<P, R> {
        let id = HandlerId(self.inner.next_id());
        let registration = Arc::new(Registration::new(id, event.into(), handler, options));
        debug!(
            event = %registration.event(),
            handler = %id,
            priority = ?registration.priority(),
            "handler registered"
        );
        self.inner.handlers.insert(Arc::clone(&registration));
        ControlHandle::new(registration, Arc::downgrade(&self.inner))
    }

    /// Removes the handler `id` from `event`.
    ///
    /// An id that is not registered under `event` is a configuration error.
    pub fn off(&self, event: &str, id: HandlerId) -> FluxResult<()> {
        self.inner.remove_handler(event, id)
    }

    /// Registers a read-only interceptor for `event`.
    ///
    /// The callback sees a clone of each handler's payload after its
    /// middlewares passed; nothing it does reaches the handler.
    pub fn intercept<F>(&self, event: &str, f: F) -> InterceptorId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = InterceptorId(self.inner.next_id());
        self.inner.interceptors.add(event, Interceptor::read_only(id, f));
        debug!(event = %event, interceptor = %id, "read-only interceptor registered");
        id
    }

    /// Registers a mutable interceptor for `event`.
    ///
    /// The callback edits each handler's payload after its middlewares passed.
    pub fn intercept_mut<F>(&self, event: &str, f: F) -> InterceptorId
    where
        F: Fn(&mut P) + Send + Sync + 'static,
    {
        let id = InterceptorId(self.inner.next_id());
        self.inner.interceptors.add(event, Interceptor::mutable(id, f));
        debug!(event = %event, interceptor = %id, "mutable interceptor registered");
        id
    }

    /// Removes interceptor `id` from `event`.
    pub fn intercept_off(&self, event: &str, id: InterceptorId) -> FluxResult<()> {
        if self.inner.interceptors.remove(event, id) {
            debug!(event = %event, interceptor = %id, "interceptor removed");
            return Ok(());
        }
        self.inner.diagnostics.fail(FluxError::UnknownInterceptor {
            event: event.to_owned(),
            id,
        })
    }

    /// Number of handlers registered under exactly `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.inner.handlers.count(event)
    }

    /// Event names with at least one handler, in first-registration order.
    pub fn events(&self) -> Vec<String> {
        self.inner.handlers.events()
    }
}

impl<P, R> fmt::Debug for EventFlux<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFlux")
            .field("events", &self.inner.handlers.events())
            .field("diagnostics", &self.inner.diagnostics.config())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    use crate::emit::EmitOptions;

    fn flux() -> EventFlux<i32, i32> {
        EventFlux::new()
    }

    #[test]
    fn test_ids_are_unique_across_events() {
        let flux = flux();
        let a = flux.on("A", Handler::sync(|n: i32| n), HandlerOptions::new());
        let b = flux.on("B", Handler::sync(|n: i32| n), HandlerOptions::new());
        let i = flux.intercept("A", |_| {});
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id().get(), i.get());
        assert_eq!(flux.events(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_off_by_id() {
        let flux = flux();
        let a = flux.on("A", Handler::sync(|n: i32| n), HandlerOptions::new());
        let b = flux.on("A", Handler::sync(|n: i32| n + 1), HandlerOptions::new());
        assert_eq!(flux.handler_count("A"), 2);

        assert_ok!(flux.off("A", a.id()));
        assert_eq!(flux.handler_count("A"), 1);
        assert_eq!(
            flux.emit("A", 1, EmitOptions::new().atomic()).unwrap(),
            Some(2)
        );

        assert_ok!(b.off());
        assert!(flux.events().is_empty());
    }

    #[test]
    fn test_unknown_ids_fail_unless_suppressed() {
        let flux = flux();
        let a = flux.on("A", Handler::sync(|n: i32| n), HandlerOptions::new());
        assert!(matches!(
            flux.off("B", a.id()),
            Err(FluxError::UnknownHandler { .. })
        ));
        let i = flux.intercept("A", |_| {});
        assert_ok!(flux.intercept_off("A", i));
        assert_err!(flux.intercept_off("A", i));

        let quiet: EventFlux<i32, i32> = EventFlux::with_diagnostics(DiagnosticsConfig {
            suppress_errors: true,
            ..Default::default()
        });
        assert_ok!(quiet.off("A", a.id()));
    }

    #[test]
    fn test_interceptors_follow_emitted_name() {
        let flux = flux();
        flux.on("A", Handler::sync(|n: i32| n), HandlerOptions::new());
        flux.intercept_mut("A", |n| *n *= *n);
        flux.intercept("A", |n| assert_eq!(*n, 49));

        assert_eq!(flux.emit("A", 7, EmitOptions::new().atomic()).unwrap(), Some(49));
    }
}
