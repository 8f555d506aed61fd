//! # EventFlux Core
//!
//! The in-process dispatch engine behind EventFlux.
//!
//! An [`EventFlux`] keeps named event channels, each with any number of
//! handlers. Callers publish payloads with one of three emission methods and
//! every handler receives its own copy under its delivery policies:
//!
//! - **Middleware** chains that may edit the payload or veto the invocation
//! - **Interceptors** registered per event, mutable or read-only
//! - **Debounce** windows that coalesce bursts into the last emission
//! - **Queues** that deliver one emission at a time, in order
//! - **Invocation limits** and **priorities**
//!
//! ```text
//! emit*(event) ─▶ resolve (exact | namespace)
//!                   │  per handler, own payload copy
//!                   ▼
//!     frozen? ─▶ debounce ─▶ limit ─▶ queue ─▶ middlewares ─▶ interceptors ─▶ handler
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use eventflux_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> FluxResult<()> {
//!     let flux: EventFlux<String, usize> = EventFlux::new();
//!     let handle = flux.on(
//!         "search:submit",
//!         Handler::sync(|q: String| q.len()),
//!         HandlerOptions::new().debounce(Duration::from_millis(300)),
//!     );
//!
//!     let emission = flux.emit_async("search:submit", "rust".into(), EmitOptions::new())?;
//!     if let Some(listeners) = emission.listeners() {
//!         listeners.on_invoke(|id| println!("handler {id} ran"));
//!     }
//!
//!     handle.off()
//! }
//! ```

mod control;
mod debounce;
mod diagnostics;
mod emit;
mod error;
mod flux;
mod handler;
mod interceptor;
mod limiter;
mod listeners;
mod middleware;
mod pipeline;
mod queue;
mod registration;
mod registry;

pub use control::ControlHandle;
pub use diagnostics::{Diagnostics, DiagnosticsConfig};
pub use emit::{AsyncEmission, AtomicResponse, EmitOptions};
pub use error::{FluxError, FluxResult, HandlerError, Settled};
pub use flux::EventFlux;
pub use handler::{BoxFuture, Handler};
pub use interceptor::InterceptorId;
pub use limiter::InvokeLimit;
pub use listeners::EmitListeners;
pub use middleware::{IntoVerdict, Middleware, Verdict};
pub use registration::{HandlerId, HandlerOptions};

/// Commonly used types.
pub mod prelude {
    pub use std::time::Duration;

    pub use crate::{
        AsyncEmission, ControlHandle, EmitOptions, EventFlux, FluxError, FluxResult, Handler,
        HandlerError, HandlerId, HandlerOptions, Middleware, Settled, Verdict,
    };
}
