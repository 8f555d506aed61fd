//! Bootstrapping engines from configuration.
//!
//! ```rust,ignore
//! use eventflux_runtime::EventFluxRuntime;
//!
//! // Auto-loads eventflux.toml from the current directory
//! let runtime = EventFluxRuntime::new();
//!
//! // Custom configuration path
//! let runtime = EventFluxRuntime::builder()
//!     .config_file("config/eventflux.toml")
//!     .profile("production")
//!     .build()?;
//!
//! let search: EventFlux<String, usize> = runtime.engine();
//! ```

use eventflux_core::EventFlux;
use tracing::info;

use crate::config::{ConfigLoader, FluxConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// Loaded configuration plus an installed subscriber.
///
/// Every engine created through [`engine`](Self::engine) shares the
/// configured diagnostic policy.
#[derive(Debug, Clone)]
pub struct EventFluxRuntime {
    config: FluxConfig,
}

impl Default for EventFluxRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFluxRuntime {
    /// Creates a runtime from the default configuration sources.
    ///
    /// If loading or validation fails, defaults are used.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .load()
            .and_then(|config| validate_config(&config).map(|()| config))
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                FluxConfig::default()
            });

        Self::from_config(config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Installs the global subscriber unless one already exists.
    pub fn from_config(config: FluxConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            suppress_warnings = config.diagnostics.suppress_warnings,
            suppress_errors = config.diagnostics.suppress_errors,
            "Runtime initialized from configuration"
        );

        Self { config }
    }

    pub fn config(&self) -> &FluxConfig {
        &self.config
    }

    /// Creates an engine using the configured diagnostics.
    pub fn engine<P, R>(&self) -> EventFlux<P, R>
    where
        P: Clone + Send + 'static,
        R: Send + 'static,
    {
        EventFlux::with_diagnostics(self.config.diagnostics)
    }
}

/// Builder for [`EventFluxRuntime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads exactly this configuration file.
    pub fn config_file(mut self, path: impl AsRef<std::path::Path>) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path(mut self, path: impl AsRef<std::path::Path>) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Programmatic defaults, below files and the environment.
    pub fn merge(mut self, config: FluxConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    /// Loads and validates the configuration, then initializes the runtime.
    pub fn build(self) -> RuntimeResult<EventFluxRuntime> {
        let config = self.loader.load()?;
        validate_config(&config)?;
        Ok(EventFluxRuntime::from_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventflux_core::{DiagnosticsConfig, EmitOptions, FluxError, Handler, HandlerOptions};
    use figment::Jail;
    use tokio_test::assert_ok;

    use crate::config::{LogOutput, LoggingConfig};
    use crate::error::RuntimeError;

    fn quiet() -> FluxConfig {
        FluxConfig {
            diagnostics: DiagnosticsConfig {
                suppress_warnings: true,
                suppress_errors: true,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_engine_follows_diagnostics() {
        let runtime = EventFluxRuntime::from_config(quiet());
        let flux: EventFlux<i32, i32> = runtime.engine();
        assert_eq!(flux.diagnostics().config(), runtime.config().diagnostics);

        flux.on("A", Handler::sync(|n: i32| n), HandlerOptions::new());
        flux.on("A", Handler::sync(|n: i32| n), HandlerOptions::new());
        // arity error swallowed
        assert_eq!(
            assert_ok!(flux.emit("A", 1, EmitOptions::new().atomic())),
            None
        );

        let loud: EventFlux<i32, i32> = EventFluxRuntime::from_config(FluxConfig::default()).engine();
        loud.on("A", Handler::sync(|n: i32| n), HandlerOptions::new());
        loud.on("A", Handler::sync(|n: i32| n), HandlerOptions::new());
        assert!(matches!(
            loud.emit("A", 1, EmitOptions::new().atomic()),
            Err(FluxError::AtomicArity { found: 2, .. })
        ));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = EventFluxRuntime::builder()
            .search_path("/nonexistent")
            .without_env()
            .merge(FluxConfig {
                logging: LoggingConfig {
                    output: LogOutput::File,
                    ..Default::default()
                },
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_builder_loads_programmatic_defaults() {
        Jail::expect_with(|jail| {
            let runtime = EventFluxRuntime::builder()
                .search_path(jail.directory())
                .without_env()
                .merge(quiet())
                .build()
                .map_err(|e| e.to_string())?;
            assert!(runtime.config().diagnostics.suppress_errors);
            Ok(())
        });
    }

    #[tokio::test]
    async fn test_engine_dispatches() {
        let runtime = EventFluxRuntime::from_config(FluxConfig::default());
        let flux: EventFlux<String, usize> = runtime.engine();
        flux.on("len", Handler::sync(|s: String| s.len()), HandlerOptions::new());

        let response = flux
            .emit_async("len", "flux".to_string(), EmitOptions::new().atomic())
            .unwrap()
            .into_response()
            .unwrap();
        assert_eq!(assert_ok!(response.await), 4);
    }
}
