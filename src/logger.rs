// ============================================================================
// logger.rs
// ============================================================================
//! Centralized logging configuration and initialization manager.
//!
//! The `LoggerManager` validates logging configuration and initializes
//! the global `tracing` subscriber with a console layer, a journald layer,
//! or both. `RUST_LOG` takes precedence over the configured level.

use std::io;

use thiserror::Error;
use time::{format_description::OwnedFormatItem, OffsetDateTime};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, format::Writer, time::FormatTime},
    prelude::*,
    EnvFilter, Layer, Registry,
};
use validator::{Validate, ValidationErrors};

use crate::{
    config::logger::{ConsoleConfig, JournaldConfig, LogFormat, LoggerConfig, TimestampFormat},
    print_info, print_warn,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors that can occur during logger configuration or initialization.
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Logger configuration validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("Invalid timestamp format: {0}")]
    TimestampFormat(String),

    /// IO error, typically while connecting to the journald socket.
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("No logging layers were configured or successfully initialized")]
    NoLayersConfigured,

    /// Journald was the only configured output and it could not be reached.
    #[error("Failed to initialize journald logger and console output is disabled: {0}")]
    JournaldUnavailable(io::Error),

    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Timestamp writer for console output.
#[derive(Debug)]
enum LogTimer {
    Rfc3339,
    Unix,
    Custom(OwnedFormatItem),
}

impl LogTimer {
    fn from_config(format: &TimestampFormat) -> Result<Self, LoggerError> {
        Ok(match format {
            TimestampFormat::Rfc3339 => LogTimer::Rfc3339,
            TimestampFormat::Unix => LogTimer::Unix,
            TimestampFormat::Custom(description) => LogTimer::Custom(
                time::format_description::parse_owned::<2>(description)
                    .map_err(|e| LoggerError::TimestampFormat(e.to_string()))?,
            ),
        })
    }

    fn write_at(&self, w: &mut Writer<'_>, now: OffsetDateTime) -> std::fmt::Result {
        let formatted = match self {
            LogTimer::Unix => {
                return write!(w, "{}.{:06}", now.unix_timestamp(), now.microsecond())
            }
            LogTimer::Rfc3339 => now.format(&time::format_description::well_known::Rfc3339),
            LogTimer::Custom(items) => now.format(items),
        };
        w.write_str(&formatted.map_err(|_| std::fmt::Error)?)
    }
}

impl FormatTime for LogTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        self.write_at(w, OffsetDateTime::now_utc())
    }
}

/// Manages logging configuration and global subscriber initialization.
pub struct LoggerManager {
    config: LoggerConfig,
}

impl LoggerManager {
    /// Creates a new `LoggerManager` and validates the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns `LoggerError::ValidationError` if configuration validation fails.
    pub fn new(config: LoggerConfig) -> Result<Self, LoggerError> {
        config.validate()?;
        Ok(LoggerManager { config })
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.config.level))
    }

    /// Builds the configured layers without installing them.
    ///
    /// A journald failure is tolerated when console output is enabled.
    fn build_layers(&self) -> Result<Vec<BoxedLayer>, LoggerError> {
        let mut layers = Vec::new();

        if let Some(console) = self.config.console.as_ref().filter(|c| c.enabled) {
            layers.push(self.console_layer(console)?);
        }

        if let Some(journald) = self.config.journald.as_ref().filter(|j| j.enabled) {
            match self.journald_layer(journald) {
                Ok(layer) => {
                    layers.push(layer);
                    print_info!(
                        "Systemd journald logger initialized with identifier: {}",
                        journald.identifier
                    );
                }
                Err(e) if layers.is_empty() => return Err(LoggerError::JournaldUnavailable(e)),
                Err(e) => print_warn!("Failed to initialize systemd journald logger: {}", e),
            }
        }

        if layers.is_empty() {
            return Err(LoggerError::NoLayersConfigured);
        }
        Ok(layers)
    }

    /// Installs the global `tracing` subscriber. Call once, before any
    /// collectors are initialized.
    ///
    /// # Errors
    ///
    /// Fails if no output is enabled, if journald is the only output and is
    /// unreachable, or if a subscriber is already installed.
    pub fn init(&self) -> Result<(), LoggerError> {
        let layers = self.build_layers()?;
        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(|e| LoggerError::AlreadyInitialized(e.to_string()))
    }

    fn console_layer(&self, config: &ConsoleConfig) -> Result<BoxedLayer, LoggerError> {
        let span_events = if config.show_spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_span_events(span_events)
            .with_ansi(config.ansi_colors)
            .with_timer(LogTimer::from_config(&self.config.timestamp_format)?)
            .with_writer(io::stdout);

        let filter = self.filter();
        Ok(match config.format {
            LogFormat::Json => base.json().with_filter(filter).boxed(),
            LogFormat::Pretty => base.pretty().with_filter(filter).boxed(),
            LogFormat::Compact => base.compact().with_filter(filter).boxed(),
        })
    }

    fn journald_layer(&self, config: &JournaldConfig) -> Result<BoxedLayer, io::Error> {
        let layer = tracing_journald::layer()?.with_syslog_identifier(config.identifier.clone());
        Ok(layer.with_filter(self.filter()).boxed())
    }
}
