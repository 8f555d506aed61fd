//! Emission strategies.
//!
//! | Method                    | Runs                               | Returns                            |
//! |---------------------------|------------------------------------|------------------------------------|
//! | [`EventFlux::emit`]       | inline, bypassing queue & debounce | the handler's value when atomic    |
//! | [`EventFlux::emit_async`] | on Tokio tasks                     | listeners, or an atomic response   |
//! | [`EventFlux::emit_all`]   | concurrently, awaited              | every invoked handler's result     |

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{Level, debug, instrument, span, trace};

use crate::error::{FluxError, FluxResult, Settled};
use crate::flux::{EventFlux, Inner};
use crate::listeners::{EmitListeners, ListenerHub, Signal};
use crate::pipeline::Outcome;
use crate::queue::{self, Admission, Delivery, settle};
use crate::registration::Registration;

/// Options shared by every emission method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOptions {
    /// Deliver to every event nested under the emitted name instead of the
    /// name itself.
    pub namespace: bool,
    /// Expect exactly one handler and hand back its result.
    pub atomic: bool,
}

impl EmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables namespace resolution.
    pub fn namespaced(mut self) -> Self {
        self.namespace = true;
        self
    }

    /// Requests an atomic emission.
    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }
}

/// Pending result of an atomic [`EventFlux::emit_async`].
///
/// Resolves to the handler's value, or to the reason it never ran.
#[must_use = "an atomic response does nothing unless awaited"]
#[derive(Debug)]
pub struct AtomicResponse<R> {
    rx: oneshot::Receiver<FluxResult<R>>,
}

impl<R> Future for AtomicResponse<R> {
    type Output = FluxResult<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(FluxError::Abandoned)))
    }
}

/// What [`EventFlux::emit_async`] started.
#[derive(Debug)]
pub enum AsyncEmission<R> {
    /// No handler matched.
    Unhandled,
    /// An atomic emission; await the response for the handler's result.
    Atomic(AtomicResponse<R>),
    /// A broadcast; attach listeners to follow its progress.
    Observed(EmitListeners),
}

impl<R> AsyncEmission<R> {
    pub fn is_unhandled(&self) -> bool {
        matches!(self, Self::Unhandled)
    }

    /// The listeners of a broadcast.
    pub fn listeners(&self) -> Option<&EmitListeners> {
        match self {
            Self::Observed(listeners) => Some(listeners),
            _ => None,
        }
    }

    /// The response of an atomic emission.
    pub fn into_response(self) -> Option<AtomicResponse<R>> {
        match self {
            Self::Atomic(response) => Some(response),
            _ => None,
        }
    }
}

impl<P, R> Inner<P, R>
where
    P: Clone + Send + 'static,
    R: Send + 'static,
{
    /// Hands one emission to one handler: limiter, then queue or a dispatch task.
    fn deliver(self: &Arc<Self>, registration: &Arc<Registration<P, R>>, delivery: Delivery<P, R>) {
        let id = registration.id();
        let delivery = match queue::admit(registration, delivery) {
            Admission::Refused(responder) => {
                trace!(handler = %id, "invoke limit reached");
                settle(responder, Err(FluxError::LimitReached { id }));
                return;
            }
            Admission::Queued {
                position,
                listeners,
                start_drain,
            } => {
                queue::on_queued(self, registration, position, listeners, start_drain);
                return;
            }
            Admission::Direct(delivery) => delivery,
        };

        let inner = Arc::clone(self);
        let registration = Arc::clone(registration);
        tokio::spawn(async move {
            let Delivery {
                event,
                mut payload,
                responder,
                listeners,
            } = delivery;

            let outcome = inner
                .pipeline(&registration, listeners.as_ref())
                .run(&event, &mut payload)
                .await;
            match outcome {
                Outcome::Proceed => {}
                Outcome::Halted => {
                    settle(responder, Err(FluxError::MiddlewareRejected { id }));
                    return;
                }
                Outcome::Frozen => {
                    settle(responder, Err(FluxError::Frozen { id }));
                    return;
                }
            }

            if let Some(hub) = &listeners {
                hub.signal(Signal::Invoke(id));
            }
            let settled = registration.handler.call(payload).await;
            match (responder, settled) {
                (Some(tx), settled) => {
                    let _ = tx.send(settled.map_err(FluxError::Handler));
                }
                (None, Err(err)) => debug!(handler = %id, error = %err, "handler failed"),
                (None, Ok(_)) => {}
            }
        });
    }

    /// Runs a handler outside any atomic emission; failures are only logged.
    fn invoke_detached(&self, registration: &Registration<P, R>, payload: P) {
        let id = registration.id();
        if registration.handler.is_sync() {
            if let Some(Err(err)) = registration.handler.call_sync(payload) {
                debug!(handler = %id, error = %err, "handler failed");
            }
            return;
        }

        match Handle::try_current() {
            Ok(runtime) => {
                let call = registration.handler.call(payload);
                runtime.spawn(async move {
                    if let Err(err) = call.await {
                        debug!(handler = %id, error = %err, "handler failed");
                    }
                });
            }
            Err(_) => self.diagnostics.warn(format!(
                "[emit] async handler {id} dropped: no Tokio runtime"
            )),
        }
    }
}

impl<P, R> EventFlux<P, R>
where
    P: Clone + Send + 'static,
    R: Send + 'static,
{
    /// Emits synchronously.
    ///
    /// Middlewares, interceptors and synchronous handlers run before this
    /// returns; asynchronous handlers are spawned onto the current Tokio
    /// runtime. Queues and debounce windows are bypassed, and a handler that
    /// is both debounced and invoke-limited is skipped.
    ///
    /// With `atomic`, exactly one handler may match and its value is returned.
    /// Frozen, exhausted or asynchronous handlers and middleware rejections
    /// are then reported as errors instead of being skipped.
    pub fn emit(&self, event: &str, payload: P, options: EmitOptions) -> FluxResult<Option<R>> {
        let span = span!(Level::DEBUG, "emit", event = %event);
        let _enter = span.enter();

        let diagnostics = &self.inner.diagnostics;
        let targets = self.inner.handlers.resolve(event, options.namespace);
        if targets.is_empty() {
            diagnostics.warn(format!("[emit] no handlers registered for '{event}'"));
            return Ok(None);
        }
        if options.atomic && targets.len() > 1 {
            diagnostics.fail(FluxError::AtomicArity {
                event: event.to_owned(),
                found: targets.len(),
            })?;
            return Ok(None);
        }

        for registration in &targets {
            let id = registration.id();
            if registration.is_frozen() {
                if options.atomic {
                    return Err(FluxError::Frozen { id });
                }
                continue;
            }
            if options.atomic && !registration.handler.is_sync() {
                return Err(FluxError::AsyncHandler { id });
            }

            let permitted = {
                let mut state = registration.state.lock();
                if state.debounce.is_some() && state.limit.is_finite() {
                    None
                } else {
                    Some(state.limit.permit())
                }
            };
            match permitted {
                None => {
                    diagnostics.warn(format!(
                        "[emit] handler {id} skipped: debounce with invoke limit needs emit_async"
                    ));
                    continue;
                }
                Some(false) if options.atomic => return Err(FluxError::LimitReached { id }),
                Some(false) => continue,
                Some(true) => {}
            }

            let mut payload = payload.clone();
            match self.inner.pipeline(registration, None).run_sync(event, &mut payload) {
                Outcome::Proceed => {}
                Outcome::Halted if options.atomic => {
                    return Err(FluxError::MiddlewareRejected { id });
                }
                Outcome::Frozen if options.atomic => return Err(FluxError::Frozen { id }),
                Outcome::Halted | Outcome::Frozen => continue,
            }

            if options.atomic {
                return match registration.handler.call_sync(payload) {
                    Some(settled) => settled.map(Some).map_err(FluxError::Handler),
                    None => Err(FluxError::AsyncHandler { id }),
                };
            }
            self.inner.invoke_detached(registration, payload);
        }

        Ok(None)
    }

    /// Emits asynchronously. Must be called from within a Tokio runtime.
    ///
    /// Each matched handler is dispatched on its own task, honouring its queue
    /// and debounce window. Without `atomic` the returned listeners report
    /// progress; with it exactly one handler may match and the returned
    /// [`AtomicResponse`] resolves to its result.
    pub fn emit_async(
        &self,
        event: &str,
        payload: P,
        options: EmitOptions,
    ) -> FluxResult<AsyncEmission<R>> {
        let span = span!(Level::DEBUG, "emit_async", event = %event);
        let _enter = span.enter();

        let diagnostics = &self.inner.diagnostics;
        if Handle::try_current().is_err() {
            diagnostics.warn(format!(
                "[emit_async] '{event}' dropped: no Tokio runtime"
            ));
            return Ok(AsyncEmission::Unhandled);
        }

        let targets = self.inner.handlers.resolve(event, options.namespace);
        if targets.is_empty() {
            diagnostics.warn(format!("[emit_async] no handlers registered for '{event}'"));
            return Ok(AsyncEmission::Unhandled);
        }
        if options.atomic && targets.len() > 1 {
            diagnostics.fail(FluxError::AtomicArity {
                event: event.to_owned(),
                found: targets.len(),
            })?;
            return Ok(AsyncEmission::Unhandled);
        }

        let mut responder = None;
        let mut hub = None;
        let emission = if options.atomic {
            let (tx, rx) = oneshot::channel();
            responder = Some(tx);
            AsyncEmission::Atomic(AtomicResponse { rx })
        } else {
            let listeners = ListenerHub::default();
            hub = Some(listeners.clone());
            AsyncEmission::Observed(EmitListeners::new(listeners))
        };

        let event: Arc<str> = Arc::from(event);
        for registration in targets {
            let id = registration.id();
            if registration.is_frozen() {
                trace!(handler = %id, "frozen handler skipped");
                settle(responder.take(), Err(FluxError::Frozen { id }));
                continue;
            }

            let delivery = Delivery {
                event: Arc::clone(&event),
                payload: payload.clone(),
                responder: responder.take(),
                listeners: hub.clone(),
            };

            let immediate = {
                let mut state = registration.state.lock();
                match state.debounce.as_mut() {
                    Some(debounce) => {
                        let inner = Arc::clone(&self.inner);
                        let target = Arc::clone(&registration);
                        debounce.schedule(move || inner.deliver(&target, delivery));
                        None
                    }
                    None => Some(delivery),
                }
            };
            match immediate {
                Some(delivery) => self.inner.deliver(&registration, delivery),
                None => trace!(handler = %id, "delivery debounced"),
            }
        }

        Ok(emission)
    }

    /// Emits to every matched handler and waits for all of them.
    ///
    /// Middleware chains run concurrently, then every handler that passed is
    /// invoked concurrently. The result holds one entry per invoked handler, in
    /// resolution order. Debounced, frozen and exhausted handlers are skipped;
    /// `atomic` has no meaning here and is ignored.
    #[instrument(level = "debug", name = "emit_all", skip_all, fields(event = %event))]
    pub async fn emit_all(&self, event: &str, payload: P, options: EmitOptions) -> Vec<Settled<R>> {
        let diagnostics = &self.inner.diagnostics;
        if options.atomic {
            diagnostics.warn(format!("[emit_all] '{event}': atomic is ignored"));
        }

        let targets: Vec<_> = self
            .inner
            .handlers
            .resolve(event, options.namespace)
            .into_iter()
            .filter(|registration| {
                if registration.is_debounced() {
                    diagnostics.warn(format!(
                        "[emit_all] '{event}': handler {} is debounced, skipped",
                        registration.id()
                    ));
                    return false;
                }
                !registration.is_frozen() && registration.state.lock().limit.permit()
            })
            .collect();
        debug!(event = %event, handlers = targets.len(), "emit_all");

        let chains = targets.iter().map(|registration| {
            let mut payload = payload.clone();
            async move {
                let outcome = self
                    .inner
                    .pipeline(registration, None)
                    .run(event, &mut payload)
                    .await;
                (registration, payload, outcome)
            }
        });
        let passed = join_all(chains).await;

        let calls = passed
            .into_iter()
            .filter(|(_, _, outcome)| *outcome == Outcome::Proceed)
            .map(|(registration, payload, _)| registration.handler.call(payload));
        join_all(calls).await
    }
}
