//! Application configuration loading, validation, and management.
//!
//! This module provides the top-level `Config` structure that aggregates
//! logging, HTTP endpoint, and collector settings. It is read from a TOML file,
//! validated with `validator`, and stays immutable once the exporter runs.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{logger::LoggerConfig, metrics::CollectorsConfig, web::WebConfig};

pub mod logger;
pub mod metrics;
pub mod web;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "BLAZEBEE_EXPORTER_CONFIG";

/// Used when `CONFIG_ENV` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/blazebee-exporter/config.toml";

/// Writes one timestamped console line. Backs the `print_*` macros, which
/// are used before the tracing subscriber is installed.
#[doc(hidden)]
pub fn print_line(level: console::StyledObject<&str>, args: fmt::Arguments<'_>) {
    let now = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    println!("{}  {} {}", console::style(now).dim(), level, args);
}

#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        $crate::config::print_line(console::style("INFO").green(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        $crate::config::print_line(console::style("WARN").yellow(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        $crate::config::print_line(console::style("ERROR").red(), format_args!($($arg)*))
    };
}

/// Errors that can occur during configuration loading, parsing or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Generic configuration-related error with a descriptive message.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while accessing configuration files.
    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// Failure to parse the TOML configuration file.
    #[error("Parse error while reading configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation failure after successful parsing.
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Top-level application configuration.
///
/// ```toml
/// [logger]
/// level = "info"
///
/// [web]
/// listen_address = "0.0.0.0:9184"
///
/// [collectors]
/// enabled = ["[defaults]", "entropy"]
/// ```
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Logging subsystem configuration.
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// HTTP endpoint configuration.
    #[validate(nested)]
    pub web: WebConfig,

    /// Which collectors run and how their output is named.
    #[validate(nested)]
    pub collectors: CollectorsConfig,
}

impl Config {
    /// Locates and loads the configuration file, or falls back to the
    /// built-in defaults when there is none.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a configuration file exists but cannot be
    /// read, parsed, or validated.
    pub fn new() -> Result<Self, ConfigError> {
        match Self::get_config_path()? {
            Some(path) => Self::load(&path),
            None => {
                print_warn!(
                    "No configuration file found ({} unset, {} missing), using defaults",
                    CONFIG_ENV,
                    DEFAULT_CONFIG_PATH
                );
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Determines the configuration file path.
    ///
    /// Priority:
    /// 1. `BLAZEBEE_EXPORTER_CONFIG` environment variable (must exist)
    /// 2. `/etc/blazebee-exporter/config.toml` (optional)
    fn get_config_path() -> Result<Option<PathBuf>, ConfigError> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(config_path);
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            if !path.exists() {
                return Err(ConfigError::Config(format!(
                    "{} points to a missing file: {}",
                    CONFIG_ENV,
                    path.display()
                )));
            }
            return Ok(Some(path));
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Ok(Some(fallback.to_path_buf()));
        }

        Ok(None)
    }

    /// Loads and validates configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing, and validation errors as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        let config_str = fs::read_to_string(path)?;
        let config = Self::from_toml(&config_str)?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(source: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }
}
