//! Handler callbacks.
//!
//! A [`Handler`] is the callback bound to an event name by
//! [`EventFlux::on`](crate::EventFlux::on). It receives its own copy of the
//! emitted payload and produces an `R`, either synchronously or as a future.
//!
//! ```rust,ignore
//! use eventflux_core::Handler;
//!
//! // Plain function, cannot fail
//! let double = Handler::sync(|n: u32| n * 2);
//!
//! // Async and fallible
//! let lookup = Handler::try_async(|id: u32| async move {
//!     if id == 0 {
//!         return Err("id must be positive".into());
//!     }
//!     Ok(id)
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;

use crate::error::{HandlerError, Settled};

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type SyncFn<P, R> = Arc<dyn Fn(P) -> Settled<R> + Send + Sync>;
type AsyncFn<P, R> = Arc<dyn Fn(P) -> BoxFuture<'static, Settled<R>> + Send + Sync>;

enum HandlerKind<P, R> {
    Sync(SyncFn<P, R>),
    Async(AsyncFn<P, R>),
}

/// A type-erased handler callback.
///
/// Cloning is cheap: the callback itself lives behind an `Arc`.
pub struct Handler<P, R> {
    kind: HandlerKind<P, R>,
}

impl<P, R> Clone for Handler<P, R> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            HandlerKind::Sync(f) => HandlerKind::Sync(Arc::clone(f)),
            HandlerKind::Async(f) => HandlerKind::Async(Arc::clone(f)),
        };
        Self { kind }
    }
}

impl<P: 'static, R: 'static> Handler<P, R> {
    /// Wraps an infallible synchronous function.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(P) -> R + Send + Sync + 'static,
    {
        Self::try_sync(move |payload| Ok(f(payload)))
    }

    /// Wraps a fallible synchronous function.
    pub fn try_sync<F>(f: F) -> Self
    where
        F: Fn(P) -> Settled<R> + Send + Sync + 'static,
    {
        Self {
            kind: HandlerKind::Sync(Arc::new(f)),
        }
    }

    /// Wraps an infallible async function.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        Self {
            kind: HandlerKind::Async(Arc::new(move |payload| {
                f(payload).map(Ok::<R, HandlerError>).boxed()
            })),
        }
    }

    /// Wraps a fallible async function.
    pub fn try_async<F, Fut>(f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Settled<R>> + Send + 'static,
    {
        Self {
            kind: HandlerKind::Async(Arc::new(move |payload| f(payload).boxed())),
        }
    }

    /// Returns `true` if the handler completes synchronously.
    pub fn is_sync(&self) -> bool {
        matches!(self.kind, HandlerKind::Sync(_))
    }

    /// Calls a synchronous handler inline.
    ///
    /// Returns `None` for asynchronous handlers; use [`Handler::call`] for those.
    pub(crate) fn call_sync(&self, payload: P) -> Option<Settled<R>> {
        match &self.kind {
            HandlerKind::Sync(f) => Some(f(payload)),
            HandlerKind::Async(_) => None,
        }
    }

    /// Calls the handler, yielding a future regardless of its flavour.
    ///
    /// Synchronous handlers run immediately and return a ready future.
    pub(crate) fn call(&self, payload: P) -> BoxFuture<'static, Settled<R>>
    where
        R: Send,
    {
        match &self.kind {
            HandlerKind::Sync(f) => futures::future::ready(f(payload)).boxed(),
            HandlerKind::Async(f) => f(payload),
        }
    }
}

impl<P, R> std::fmt::Debug for Handler<P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flavour = match self.kind {
            HandlerKind::Sync(_) => "sync",
            HandlerKind::Async(_) => "async",
        };
        f.debug_struct("Handler").field("kind", &flavour).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_handler_runs_inline() {
        let handler = Handler::sync(|n: u32| n + 1);
        assert!(handler.is_sync());
        assert_eq!(handler.call_sync(1).unwrap().unwrap(), 2);
    }

    #[test]
    fn test_try_sync_surfaces_error() {
        let handler: Handler<u32, u32> = Handler::try_sync(|_| Err("nope".into()));
        let err = handler.call_sync(1).unwrap().unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[tokio::test]
    async fn test_async_handler_has_no_inline_result() {
        let handler = Handler::from_async(|n: u32| async move { n * 3 });
        assert!(!handler.is_sync());
        assert!(handler.call_sync(2).is_none());
        assert_eq!(handler.call(2).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_clone_does_not_need_clone_types() {
        struct Job(u32);
        struct Done(u32);

        let sync = Handler::sync(|job: Job| Done(job.0 + 1));
        assert_eq!(sync.clone().call_sync(Job(1)).unwrap().unwrap().0, 2);

        let deferred = Handler::from_async(|job: Job| async move { Done(job.0 * 2) });
        let copy = deferred.clone();
        assert!(!copy.is_sync());
        assert_eq!(copy.call(Job(4)).await.unwrap().0, 8);
    }
}
