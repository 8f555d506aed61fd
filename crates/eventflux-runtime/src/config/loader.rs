//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `eventflux.toml`
//! - `yaml-config`: `eventflux.yaml` / `eventflux.yml`
//!
//! With both enabled, both formats are searched and merged, TOML first.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides passed to [`ConfigLoader::merge`]
//! 3. Profile-specific config file (`eventflux.{profile}.toml`)
//! 4. Main config file (`eventflux.toml`)
//! 5. Environment variables (`EVENTFLUX_*`)
//!
//! # Environment Variable Mapping
//!
//! The `EVENTFLUX_` prefix is stripped and `__` separates nesting levels:
//!
//! - `EVENTFLUX_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `EVENTFLUX_DIAGNOSTICS__SUPPRESS_WARNINGS=true` → `diagnostics.suppress_warnings = true`
//!
//! `EVENTFLUX_PROFILE` selects the profile and is not part of the document.
//!
//! # Example
//!
//! ```rust,ignore
//! use eventflux_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/eventflux.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::FluxConfig;

const ENV_PREFIX: &str = "EVENTFLUX_";
const PROFILE_VAR: &str = "EVENTFLUX_PROFILE";
const FILE_STEM: &str = "eventflux";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads `EVENTFLUX_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multi-source configuration loader.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load instead of searching.
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader that searches the default locations and reads the
    /// environment.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    ///
    /// Without any, the current directory and `<config dir>/eventflux` are
    /// searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges configuration values programmatically, below files and the
    /// environment.
    pub fn merge(mut self, config: FluxConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<FluxConfig> {
        let profile = self.profile.clone();
        let config: FluxConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(FluxConfig::default()));
        figment = figment.merge(std::mem::take(&mut self.figment));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["profile"]).split("__"));
        }

        Ok(figment)
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(FILE_STEM));
        }
        paths
    }

    /// Searches `search_paths × extensions` for the first main file; its
    /// profile variant, when present, is merged below it.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        extensions: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for ext in extensions {
                let base_path = search_path.join(format!("{FILE_STEM}.{ext}"));
                if !base_path.exists() {
                    continue;
                }

                let profile_path =
                    search_path.join(format!("{FILE_STEM}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                info!(path = %base_path.display(), "Loading configuration file");
                return (merge_fn(figment, &base_path), true);
            }
        }
        (figment, false)
    }

    #[allow(unused_mut)]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(figment, &search_paths, &["toml"], |fig, path| {
                fig.merge(Toml::file(path))
            });
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) =
                self.load_format_files(figment, &search_paths, &["yaml", "yml"], |fig, path| {
                    fig.merge(Yaml::file(path))
                });
            figment = f;
            found |= ok;
        }

        if !found {
            warn!(profile = %self.profile, "No configuration file found, using defaults");
        }
        figment
    }
}

/// Merges a single config file, dispatching on its extension.
fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Loads from the default locations with environment overrides.
pub fn load_config() -> ConfigResult<FluxConfig> {
    ConfigLoader::new().load()
}

/// Loads exactly `path` with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<FluxConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogFormat, LogLevel};
    use figment::Jail;

    #[test]
    fn test_defaults_without_files() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config, FluxConfig::default());
            assert_eq!(config.logging.level.as_str(), "info");
            Ok(())
        });
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_VAR, "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("EVENTFLUX_LOGGING__LEVEL", "debug");
            jail.set_env("EVENTFLUX_DIAGNOSTICS__SUPPRESS_WARNINGS", "true");
            jail.set_env(PROFILE_VAR, "staging");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert!(config.diagnostics.suppress_warnings);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = ConfigLoader::new()
            .without_env()
            .file("/nonexistent/eventflux.toml")
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("eventflux.ini", "level = debug")?;
            let result = ConfigLoader::new().without_env().file("eventflux.ini").load();
            assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ext)) if ext == "ini"));
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_file_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "eventflux.toml",
                r#"
                [logging]
                level = "warn"
                format = "pretty"
                "#,
            )?;
            jail.create_file(
                "eventflux.production.toml",
                r#"
                [logging]
                level = "error"
                thread_ids = true
                "#,
            )?;
            jail.set_env("EVENTFLUX_LOGGING__FORMAT", "full");

            let config = ConfigLoader::new()
                .profile("production")
                .search_path(jail.directory())
                .merge(FluxConfig {
                    diagnostics: eventflux_core::DiagnosticsConfig {
                        suppress_errors: true,
                        ..Default::default()
                    },
                    ..Default::default()
                })
                .load()
                .map_err(|e| e.to_string())?;

            // main file beats the profile file, env beats both
            assert_eq!(config.logging.level, LogLevel::Warn);
            assert!(config.logging.thread_ids);
            assert_eq!(config.logging.format, LogFormat::Full);
            assert!(config.diagnostics.suppress_errors);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_malformed_file_fails_extraction() {
        Jail::expect_with(|jail| {
            jail.create_file("eventflux.toml", "[logging]\nlevel = \"loud\"\n")?;
            let result = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load();
            assert!(matches!(result, Err(ConfigError::Extract(_))));
            Ok(())
        });
    }
}
