//! TOML configuration loading.
//!
//! The file is optional: no `--config` flag, or a path that does not exist,
//! yields [`RelayConfig::default()`].  Fields missing from the file keep their
//! defaults (see `domain::config`).

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::config::RelayConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The TOML parsed but a value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Parses and validates configuration text.
///
/// # Errors
///
/// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`] for
/// values that parse but cannot be used.
pub fn parse_config(text: &str) -> Result<RelayConfig, ConfigError> {
    let config: RelayConfig = toml::from_str(text)?;
    validate(&config)?;
    Ok(config)
}

/// Loads configuration from `path`, or defaults when `path` is `None` or the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and the errors of [`parse_config`] otherwise.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(RelayConfig::default());
    };

    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RelayConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn validate(config: &RelayConfig) -> Result<(), ConfigError> {
    if config.scan.batch_size == 0 {
        return Err(ConfigError::Invalid("scan.batch_size must be at least 1".into()));
    }
    if config.scan.probe_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "scan.probe_timeout_ms must be at least 1".into(),
        ));
    }
    if config.delivery.session_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "delivery.session_timeout_ms must be at least 1".into(),
        ));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
