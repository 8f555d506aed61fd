//! Per-handler middleware.
//!
//! Middlewares run before a handler, in the order they were added. Each one
//! sees the emitted event name and the handler's copy of the payload, and may
//! edit the payload or veto the invocation.
//!
//! A middleware returns anything implementing [`IntoVerdict`]:
//!
//! | Return value              | Effect                          |
//! |---------------------------|---------------------------------|
//! | `()`                      | continue                        |
//! | `true` / `Verdict::Continue` | continue                     |
//! | `false` / `Verdict::Halt` | stop, report a middleware halt  |
//! | `Err(_)`                  | stop, log a warning             |
//!
//! ```rust,ignore
//! use eventflux_core::Middleware;
//!
//! let only_odd = Middleware::sync(|_, n: &mut u32| *n % 2 == 1);
//!
//! let throttle = Middleware::from_async(|_, n: &mut u32| {
//!     Box::pin(async move {
//!         tokio::time::sleep(Duration::from_millis(10)).await;
//!         *n += 1;
//!     })
//! });
//! ```

use std::sync::Arc;

use futures::FutureExt;

use crate::error::HandlerError;
use crate::handler::BoxFuture;

/// Whether a handler may proceed past a middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Run the next middleware, then the handler.
    Continue,
    /// Stop here; the handler does not run for this emission.
    Halt,
}

impl From<bool> for Verdict {
    fn from(proceed: bool) -> Self {
        if proceed { Self::Continue } else { Self::Halt }
    }
}

/// Conversion from a middleware's return value into a [`Verdict`].
pub trait IntoVerdict {
    /// Performs the conversion. `Err` marks a failed middleware.
    fn into_verdict(self) -> Result<Verdict, HandlerError>;
}

impl IntoVerdict for Verdict {
    fn into_verdict(self) -> Result<Verdict, HandlerError> {
        Ok(self)
    }
}

impl IntoVerdict for () {
    fn into_verdict(self) -> Result<Verdict, HandlerError> {
        Ok(Verdict::Continue)
    }
}

impl IntoVerdict for bool {
    fn into_verdict(self) -> Result<Verdict, HandlerError> {
        Ok(Verdict::from(self))
    }
}

impl<T: IntoVerdict> IntoVerdict for Result<T, HandlerError> {
    fn into_verdict(self) -> Result<Verdict, HandlerError> {
        self.and_then(IntoVerdict::into_verdict)
    }
}

type SyncMiddlewareFn<P> = dyn Fn(&str, &mut P) -> Result<Verdict, HandlerError> + Send + Sync;
type AsyncMiddlewareFn<P> = dyn for<'a> Fn(&'a str, &'a mut P) -> BoxFuture<'a, Result<Verdict, HandlerError>>
    + Send
    + Sync;

// Pins the higher-ranked signature on the closures built in the constructors.
fn erase_sync<P, F>(f: F) -> Arc<SyncMiddlewareFn<P>>
where
    F: Fn(&str, &mut P) -> Result<Verdict, HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn erase_async<P, F>(f: F) -> Arc<AsyncMiddlewareFn<P>>
where
    F: for<'a> Fn(&'a str, &'a mut P) -> BoxFuture<'a, Result<Verdict, HandlerError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

enum MiddlewareKind<P> {
    Sync(Arc<SyncMiddlewareFn<P>>),
    Async(Arc<AsyncMiddlewareFn<P>>),
}

/// A gatekeeping function run before a handler.
pub struct Middleware<P> {
    kind: MiddlewareKind<P>,
}

impl<P> Clone for Middleware<P> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            MiddlewareKind::Sync(f) => MiddlewareKind::Sync(Arc::clone(f)),
            MiddlewareKind::Async(f) => MiddlewareKind::Async(Arc::clone(f)),
        };
        Self { kind }
    }
}

/// The result of calling a middleware.
pub(crate) enum Invocation<'a> {
    Ready(Result<Verdict, HandlerError>),
    Pending(BoxFuture<'a, Result<Verdict, HandlerError>>),
}

impl<P: 'static> Middleware<P> {
    /// Wraps a synchronous middleware.
    pub fn sync<F, O>(f: F) -> Self
    where
        F: Fn(&str, &mut P) -> O + Send + Sync + 'static,
        O: IntoVerdict,
    {
        Self {
            kind: MiddlewareKind::Sync(erase_sync(move |event, payload| {
                f(event, payload).into_verdict()
            })),
        }
    }

    /// Wraps an asynchronous middleware.
    ///
    /// The closure returns a boxed future borrowing the event name and the
    /// payload, which lets it edit the payload after an `.await`.
    pub fn from_async<F, O>(f: F) -> Self
    where
        F: for<'a> Fn(&'a str, &'a mut P) -> BoxFuture<'a, O> + Send + Sync + 'static,
        O: IntoVerdict + 'static,
    {
        Self {
            kind: MiddlewareKind::Async(erase_async(move |event, payload| {
                f(event, payload).map(IntoVerdict::into_verdict).boxed()
            })),
        }
    }

    /// Returns `true` for middlewares built with [`Middleware::sync`].
    pub fn is_sync(&self) -> bool {
        matches!(self.kind, MiddlewareKind::Sync(_))
    }

    pub(crate) fn invoke<'a>(&'a self, event: &'a str, payload: &'a mut P) -> Invocation<'a> {
        match &self.kind {
            MiddlewareKind::Sync(f) => Invocation::Ready(f(event, payload)),
            MiddlewareKind::Async(f) => Invocation::Pending(f(event, payload)),
        }
    }
}

impl<P> std::fmt::Debug for Middleware<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flavour = match self.kind {
            MiddlewareKind::Sync(_) => "sync",
            MiddlewareKind::Async(_) => "async",
        };
        f.debug_struct("Middleware").field("kind", &flavour).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict_of(result: Invocation<'_>) -> Result<Verdict, HandlerError> {
        match result {
            Invocation::Ready(v) => v,
            Invocation::Pending(_) => panic!("expected a synchronous middleware"),
        }
    }

    #[test]
    fn test_return_values_map_to_verdicts() {
        assert_eq!(().into_verdict().unwrap(), Verdict::Continue);
        assert_eq!(true.into_verdict().unwrap(), Verdict::Continue);
        assert_eq!(false.into_verdict().unwrap(), Verdict::Halt);
        assert_eq!(Ok::<_, HandlerError>(false).into_verdict().unwrap(), Verdict::Halt);
        assert!(Err::<(), HandlerError>("bad".into()).into_verdict().is_err());
    }

    #[test]
    fn test_sync_middleware_edits_payload() {
        let mw = Middleware::sync(|_, n: &mut u32| {
            *n += 1;
        });
        let mut payload = 1;
        let verdict = verdict_of(mw.invoke("tick", &mut payload)).unwrap();
        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(payload, 2);
    }

    #[tokio::test]
    async fn test_async_middleware_edits_after_await() {
        let mw = Middleware::from_async(|event, n: &mut u32| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                *n *= 10;
                event == "tick"
            })
        });
        let mut payload = 4;
        let verdict = match mw.invoke("tick", &mut payload) {
            Invocation::Pending(fut) => fut.await.unwrap(),
            Invocation::Ready(_) => panic!("expected an asynchronous middleware"),
        };
        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(payload, 40);
    }
}
