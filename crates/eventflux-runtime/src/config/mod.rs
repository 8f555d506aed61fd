//! Layered configuration for EventFlux engines.
//!
//! Settings come from TOML/YAML files, `EVENTFLUX_*` environment variables
//! and programmatic defaults, merged with figment.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    FluxConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
