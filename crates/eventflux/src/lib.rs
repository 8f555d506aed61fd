//! # EventFlux
//!
//! An in-process event bus for Rust services.
//!
//! ## Overview
//!
//! Handlers register under event names; callers publish typed payloads and
//! every handler receives its own copy, subject to its delivery policies:
//! middleware chains, interceptors, debounce windows, FIFO queues,
//! invocation limits and priorities.
//!
//! ```text
//! ┌──────────┐     ┌──────────────┐     ┌──────────────────────────────────┐
//! │  emit*   │────▶│   Registry   │────▶│ handler "search:submit" (debounce)│
//! │ (caller) │     │ exact | ns   │────▶│ handler "search:log"    (queue)   │
//! └──────────┘     └──────────────┘────▶│ handler ...                       │
//!                                       └──────────────────────────────────┘
//! ```
//!
//! - **Core** ([`core`]): the engine, handlers, middlewares, emission modes
//! - **Runtime** ([`runtime`]): configuration loading and logging setup
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use eventflux::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = EventFluxRuntime::new();
//!     let flux: EventFlux<String, usize> = runtime.engine();
//!
//!     flux.on("len", Handler::sync(|s: String| s.len()), HandlerOptions::new());
//!     let len = flux.emit("len", "flux".into(), EmitOptions::new().atomic())?;
//!     assert_eq!(len, Some(4));
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log lines

pub use eventflux_core as core;
pub use eventflux_runtime as runtime;

pub use eventflux_core::{
    ControlHandle, EmitOptions, EventFlux, FluxError, FluxResult, Handler, HandlerOptions,
};
pub use eventflux_runtime::EventFluxRuntime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime - main entry point
    pub use eventflux_runtime::{EventFluxRuntime, FluxConfig};

    // Engine and emission
    pub use eventflux_core::prelude::*;
    pub use eventflux_core::{AtomicResponse, EmitListeners, InterceptorId, InvokeLimit};

    // Logging macros
    pub use eventflux_runtime::prelude::*;
}
