//! Diagnostic sink for the engine.
//!
//! Every warning and configuration error the engine produces goes through
//! [`Diagnostics`]. Warnings are written with `tracing::warn!`; fatal errors
//! are logged and handed back to the caller, unless the respective
//! suppression switch is set.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{FluxError, FluxResult};

/// Suppression switches for the diagnostic sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Drop warnings instead of logging them.
    #[serde(default)]
    pub suppress_warnings: bool,

    /// Swallow configuration errors instead of returning them.
    #[serde(default)]
    pub suppress_errors: bool,
}

/// Warning and failure reporting with a configurable policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    config: DiagnosticsConfig,
}

impl Diagnostics {
    /// Creates a sink with the given suppression switches.
    pub fn new(config: DiagnosticsConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> DiagnosticsConfig {
        self.config
    }

    /// Reports a non-fatal condition.
    pub fn warn(&self, message: impl AsRef<str>) {
        if self.config.suppress_warnings {
            return;
        }
        warn!("{}", message.as_ref());
    }

    /// Reports a configuration error.
    ///
    /// Returns `Err(err)` unless errors are suppressed, in which case the error
    /// is dropped and `Ok(())` comes back.
    pub fn fail(&self, err: FluxError) -> FluxResult<()> {
        if self.config.suppress_errors {
            return Ok(());
        }
        error!(error = %err, "eventflux configuration error");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn arity() -> FluxError {
        FluxError::AtomicArity {
            event: "A".into(),
            found: 3,
        }
    }

    #[test]
    fn test_fail_raises_by_default() {
        let sink = Diagnostics::default();
        assert_err!(sink.fail(arity()));
    }

    #[test]
    fn test_fail_suppressed() {
        let sink = Diagnostics::new(DiagnosticsConfig {
            suppress_errors: true,
            ..Default::default()
        });
        assert_ok!(sink.fail(arity()));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: DiagnosticsConfig =
            serde_json::from_str(r#"{ "suppress_warnings": true }"#).unwrap();
        assert!(config.suppress_warnings);
        assert!(!config.suppress_errors);
    }
}
