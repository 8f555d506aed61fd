//! Error types for the EventFlux engine.

use thiserror::Error;

use crate::interceptor::InterceptorId;
use crate::registration::HandlerId;

/// Error returned by fallible handlers and middlewares.
///
/// Anything implementing [`std::error::Error`] converts into it with `?` or
/// `.into()`, including plain string messages.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a single handler invocation.
///
/// [`EventFlux::emit_all`](crate::EventFlux::emit_all) returns one of these per
/// handler that passed its middleware chain.
pub type Settled<R> = Result<R, HandlerError>;

/// Errors produced by the dispatch engine.
#[derive(Debug, Error)]
pub enum FluxError {
    /// An atomic emission resolved a handler count other than one.
    #[error("atomic emission of '{event}' requires exactly one handler, found {found}")]
    AtomicArity {
        /// The emitted event name.
        event: String,
        /// How many handlers were resolved.
        found: usize,
    },

    /// `off` was called with an id that is not registered under the event.
    #[error("handler {id} is not registered for '{event}'")]
    UnknownHandler {
        /// The event name passed to `off`.
        event: String,
        /// The stale or foreign handler id.
        id: HandlerId,
    },

    /// `intercept_off` was called with an unknown interceptor id.
    #[error("interceptor {id} is not registered for '{event}'")]
    UnknownInterceptor {
        /// The event name passed to `intercept_off`.
        event: String,
        /// The stale or foreign interceptor id.
        id: InterceptorId,
    },

    /// The handler was frozen when the emission reached it.
    #[error("handler {id} is frozen")]
    Frozen {
        /// The frozen handler.
        id: HandlerId,
    },

    /// A middleware halted (or failed) before the handler could run.
    #[error("emission to handler {id} was rejected by middleware")]
    MiddlewareRejected {
        /// The handler whose chain halted.
        id: HandlerId,
    },

    /// The handler has used up its invocation budget.
    #[error("handler {id} reached its invocation limit")]
    LimitReached {
        /// The exhausted handler.
        id: HandlerId,
    },

    /// A synchronous atomic emission targeted an asynchronous handler.
    #[error("handler {id} is asynchronous, use emit_async for an atomic response")]
    AsyncHandler {
        /// The asynchronous handler.
        id: HandlerId,
    },

    /// The pending atomic response was dropped before the handler produced a value.
    ///
    /// This happens when the handler's queue is toggled off while the entry
    /// was still waiting, or when a debounced emission is superseded.
    #[error("atomic response was abandoned before the handler ran")]
    Abandoned,

    /// The handler itself returned an error.
    #[error("handler failed: {0}")]
    Handler(#[source] HandlerError),
}

impl FluxError {
    /// Returns `true` if this error was produced by the handler rather than the engine.
    pub fn is_handler_failure(&self) -> bool {
        matches!(self, Self::Handler(_))
    }
}

/// Result type for engine operations.
pub type FluxResult<T> = Result<T, FluxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_message() {
        let err = FluxError::AtomicArity {
            event: "A".into(),
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "atomic emission of 'A' requires exactly one handler, found 2"
        );
    }

    #[test]
    fn test_handler_failure_keeps_source() {
        let err = FluxError::Handler("boom".into());
        assert!(err.is_handler_failure());
        assert_eq!(
            std::error::Error::source(&err).map(ToString::to_string),
            Some("boom".to_string())
        );
    }
}
