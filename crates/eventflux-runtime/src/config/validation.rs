//! Configuration validation utilities.

use tracing_subscriber::filter::Directive;

use super::error::{ConfigError, ConfigResult};
use super::schema::{FluxConfig, LogFormat, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &FluxConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    for (target, level) in &logging.filters {
        validate_filter(target, level.as_str())?;
    }

    if logging.output == LogOutput::File {
        validate_file_output(logging)?;
    }

    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "JSON log format requires the `json-log` feature",
        ));
    }

    Ok(())
}

/// Validates one `target = level` filter entry.
fn validate_filter(target: &str, level: &str) -> ConfigResult<()> {
    let directive = format!("{target}={level}");
    if target.is_empty() || target.contains(char::is_whitespace) || target.contains('=') {
        return Err(ConfigError::invalid_directive(
            directive,
            "target must be a non-empty module path",
        ));
    }
    directive
        .parse::<Directive>()
        .map_err(|e| ConfigError::invalid_directive(&directive, e))?;
    Ok(())
}

/// Validates file output settings.
fn validate_file_output(logging: &LoggingConfig) -> ConfigResult<()> {
    let Some(path) = &logging.file_path else {
        return Err(ConfigError::validation(
            "`logging.file_path` is required when output is \"file\"",
        ));
    };

    if path.file_name().is_none() {
        return Err(ConfigError::validation(format!(
            "Log file path has no file name: {}",
            path.display()
        )));
    }

    Ok(())
}
