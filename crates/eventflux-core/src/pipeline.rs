//! The per-handler stage between resolution and invocation: middleware chain,
//! then interceptors.

use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::trace;

use crate::diagnostics::Diagnostics;
use crate::error::HandlerError;
use crate::listeners::{ListenerHub, Signal};
use crate::middleware::{Invocation, Middleware, Verdict};
use crate::registration::Registration;
use crate::registry::InterceptorRegistry;

/// How a payload left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Every middleware passed and the interceptors ran.
    Proceed,
    /// A middleware halted or failed.
    Halted,
    /// The handler was frozen at one of the checkpoints.
    Frozen,
}

/// Pipeline of one handler for one emission.
pub(crate) struct Pipeline<'a, P, R> {
    pub registration: &'a Registration<P, R>,
    pub interceptors: &'a InterceptorRegistry<P>,
    pub diagnostics: &'a Diagnostics,
    pub listeners: Option<&'a ListenerHub>,
}

impl<P: Clone + 'static, R> Pipeline<'_, P, R> {
    /// Runs the chain, awaiting asynchronous middlewares.
    pub async fn run(&self, event: &str, payload: &mut P) -> Outcome {
        let middlewares = self.registration.middlewares();
        for (passed, middleware) in middlewares.iter().enumerate() {
            if self.registration.is_frozen() {
                return Outcome::Frozen;
            }
            let verdict = match middleware.invoke(event, payload) {
                Invocation::Ready(verdict) => verdict,
                Invocation::Pending(fut) => fut.await,
            };
            if !self.proceeds(verdict, passed) {
                return Outcome::Halted;
            }
        }
        self.finish(event, payload)
    }

    /// Runs the chain without awaiting.
    ///
    /// An asynchronous middleware is polled once. If it does not complete on
    /// that poll, or no Tokio runtime is available to poll it in, it counts as
    /// passing and a warning is logged.
    pub fn run_sync(&self, event: &str, payload: &mut P) -> Outcome {
        let middlewares = self.registration.middlewares();
        for (passed, middleware) in middlewares.iter().enumerate() {
            if self.registration.is_frozen() {
                return Outcome::Frozen;
            }
            let verdict = self.poll_once(middleware, event, payload);
            if !self.proceeds(verdict, passed) {
                return Outcome::Halted;
            }
        }
        self.finish(event, payload)
    }

    fn poll_once(
        &self,
        middleware: &Middleware<P>,
        event: &str,
        payload: &mut P,
    ) -> Result<Verdict, HandlerError> {
        let fut = match middleware.invoke(event, payload) {
            Invocation::Ready(verdict) => return verdict,
            Invocation::Pending(fut) => fut,
        };
        let id = self.registration.id();
        if Handle::try_current().is_err() {
            self.diagnostics.warn(format!(
                "[emit] async middleware of handler {id} skipped: no Tokio runtime"
            ));
            return Ok(Verdict::Continue);
        }
        fut.now_or_never().unwrap_or_else(|| {
            self.diagnostics.warn(format!(
                "[emit] async middleware of handler {id} did not complete synchronously, use emit_async"
            ));
            Ok(Verdict::Continue)
        })
    }

    fn proceeds(&self, verdict: Result<Verdict, HandlerError>, passed: usize) -> bool {
        let id = self.registration.id();
        match verdict {
            Ok(Verdict::Continue) => return true,
            Ok(Verdict::Halt) => {
                trace!(handler = %id, passed, "middleware halted");
            }
            Err(err) => {
                self.diagnostics
                    .warn(format!("middleware of handler {id} failed: {err}"));
            }
        }
        if let Some(hub) = self.listeners {
            hub.signal(Signal::Halt(id, passed));
        }
        false
    }

    fn finish(&self, event: &str, payload: &mut P) -> Outcome {
        if self.registration.is_frozen() {
            return Outcome::Frozen;
        }
        self.interceptors.apply(event, payload);
        Outcome::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::handler::Handler;
    use crate::interceptor::{Interceptor, InterceptorId};
    use crate::listeners::EmitListeners;
    use crate::registration::{HandlerId, HandlerOptions};

    fn registration(options: HandlerOptions<i32>) -> Registration<i32, i32> {
        Registration::new(HandlerId(1), "A".into(), Handler::sync(|n: i32| n), options)
    }

    #[tokio::test]
    async fn test_halt_reports_passed_count() {
        let reg = registration(
            HandlerOptions::new()
                .middleware(Middleware::sync(|_, _: &mut i32| true))
                .middleware(Middleware::sync(|_, n: &mut i32| *n > 100))
                .middleware(Middleware::sync(|_, _: &mut i32| -> bool { unreachable!() })),
        );
        let interceptors = InterceptorRegistry::default();
        let diagnostics = Diagnostics::default();
        let hub = ListenerHub::default();
        let halts = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&halts);
        EmitListeners::new(hub.clone()).on_middleware_halt(move |_, n| sink.lock().push(n));

        let pipeline = Pipeline {
            registration: &reg,
            interceptors: &interceptors,
            diagnostics: &diagnostics,
            listeners: Some(&hub),
        };
        let mut payload = 1;
        assert_eq!(pipeline.run("A", &mut payload).await, Outcome::Halted);
        assert_eq!(*halts.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_failed_middleware_halts() {
        let reg = registration(HandlerOptions::new().middleware(Middleware::sync(
            |_, _: &mut i32| -> Result<bool, HandlerError> { Err("broken".into()) },
        )));
        let interceptors = InterceptorRegistry::default();
        let diagnostics = Diagnostics::default();
        let pipeline = Pipeline {
            registration: &reg,
            interceptors: &interceptors,
            diagnostics: &diagnostics,
            listeners: None,
        };
        let mut payload = 1;
        assert_eq!(pipeline.run("A", &mut payload).await, Outcome::Halted);
    }

    #[test]
    fn test_sync_run_applies_interceptors_after_chain() {
        let reg = registration(
            HandlerOptions::new().middleware(Middleware::sync(|_, n: &mut i32| *n += 1)),
        );
        let interceptors = InterceptorRegistry::default();
        interceptors.add("A", Interceptor::mutable(InterceptorId(9), |n: &mut i32| *n *= 10));
        let diagnostics = Diagnostics::default();
        let pipeline = Pipeline {
            registration: &reg,
            interceptors: &interceptors,
            diagnostics: &diagnostics,
            listeners: None,
        };

        let mut payload = 1;
        assert_eq!(pipeline.run_sync("A", &mut payload), Outcome::Proceed);
        assert_eq!(payload, 20);
    }

    #[test]
    fn test_frozen_handler_skips_interceptors() {
        let reg = registration(HandlerOptions::new());
        reg.set_frozen(true);
        let interceptors = InterceptorRegistry::default();
        interceptors.add("A", Interceptor::mutable(InterceptorId(9), |n: &mut i32| *n = 0));
        let diagnostics = Diagnostics::default();
        let pipeline = Pipeline {
            registration: &reg,
            interceptors: &interceptors,
            diagnostics: &diagnostics,
            listeners: None,
        };

        let mut payload = 5;
        assert_eq!(pipeline.run_sync("A", &mut payload), Outcome::Frozen);
        assert_eq!(payload, 5);
    }

    #[tokio::test]
    async fn test_sync_run_polls_ready_async_middleware() {
        let reg = registration(HandlerOptions::new().middleware(Middleware::from_async(
            |_, n: &mut i32| Box::pin(async move { *n < 0 }),
        )));
        let interceptors = InterceptorRegistry::default();
        let diagnostics = Diagnostics::default();
        let pipeline = Pipeline {
            registration: &reg,
            interceptors: &interceptors,
            diagnostics: &diagnostics,
            listeners: None,
        };

        let mut payload = 3;
        assert_eq!(pipeline.run_sync("A", &mut payload), Outcome::Halted);
    }
}
