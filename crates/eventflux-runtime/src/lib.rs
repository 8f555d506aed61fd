//! EventFlux Runtime - configuration and logging bootstrap.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `FluxConfig`)
//! - Subscriber setup driven by that configuration (`LoggingBuilder`)
//! - `EventFluxRuntime`, which ties both together and hands out engines
//!   sharing the configured diagnostic policy
//!
//! ```ignore
//! use eventflux_runtime::EventFluxRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = EventFluxRuntime::builder().profile("production").build()?;
//!     let flux: EventFlux<String> = runtime.engine();
//!     // register handlers, emit...
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, FluxConfig, LoggingConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{EventFluxRuntime, RuntimeBuilder};

pub use tracing;
pub use tracing_subscriber;

/// Logging macros for code built on the runtime.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
