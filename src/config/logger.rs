//! Logging configuration structures and validation logic.
//!
//! These types describe the console and journald outputs installed by
//! [`crate::logger::LoggerManager`]. They are read from the `[logger]` table
//! and validated before any subscriber is built.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Available formats for console log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Formats available for timestamp representation in log entries.
///
/// `custom` takes a `time` format description, e.g.
/// `{ custom = "[hour]:[minute]:[second]" }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampFormat {
    #[default]
    Rfc3339,
    Unix,
    Custom(String),
}

/// Top-level logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    /// Global log level: trace, debug, info, warn or error (case-insensitive).
    /// `RUST_LOG` overrides it when set.
    #[validate(custom(function = "validate_log_level"))]
    pub level: String,

    #[validate(nested)]
    pub console: Option<ConsoleConfig>,

    #[validate(nested)]
    pub journald: Option<JournaldConfig>,

    /// Timestamp format for console output. Journald stamps entries itself.
    #[validate(custom(function = "validate_timestamp_format"))]
    pub timestamp_format: TimestampFormat,
}

fn validate_timestamp_format(format: &TimestampFormat) -> Result<(), ValidationError> {
    let TimestampFormat::Custom(description) = format else {
        return Ok(());
    };

    let problem = if description.is_empty() {
        Some("Custom timestamp format cannot be empty".to_string())
    } else {
        time::format_description::parse_owned::<2>(description)
            .err()
            .map(|e| format!("Invalid custom timestamp format '{}': {}", description, e))
    };

    match problem {
        None => Ok(()),
        Some(message) => {
            let mut err = ValidationError::new("invalid_timestamp_format");
            err.message = Some(message.into());
            Err(err)
        }
    }
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => {
            let mut err = ValidationError::new("invalid_log_level");
            err.message = Some(format!("Invalid log level: {}", level).into());
            Err(err)
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: "info".to_string(),
            timestamp_format: TimestampFormat::default(),
            console: Some(ConsoleConfig::default()),
            journald: Some(JournaldConfig::default()),
        }
    }
}

/// Configuration for console log output.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    /// Include the log target (module path) in output.
    pub show_target: bool,
    pub show_thread_ids: bool,
    /// Include span close events, which carry span timings.
    pub show_spans: bool,
    pub ansi_colors: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            enabled: true,
            format: LogFormat::default(),
            show_target: false,
            show_thread_ids: false,
            show_spans: false,
            ansi_colors: true,
        }
    }
}

/// Configuration for systemd journald output.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct JournaldConfig {
    pub enabled: bool,

    /// `SYSLOG_IDENTIFIER` of the journal entries.
    #[validate(length(min = 1))]
    pub identifier: String,
}

impl Default for JournaldConfig {
    fn default() -> Self {
        JournaldConfig {
            enabled: false,
            identifier: "blazebee-exporter".to_string(),
        }
    }
}
