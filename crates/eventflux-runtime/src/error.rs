//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while bootstrapping the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A global subscriber is already installed.
    #[error("Failed to install log subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    /// The log file appender could not be created.
    #[error("Failed to open log file: {0}")]
    LogFile(#[from] tracing_appender::rolling::InitError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
