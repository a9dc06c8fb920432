use thiserror::Error;

/// Error type for the collector system.
///
/// Besides plain read/parse failures it carries the kinds the executor and the
/// registry treat specially:
/// * [`CollectorError::NoData`] is benign at scrape time: the source is inactive
///   on this host, the collector still counts as successful.
/// * [`CollectorError::SourceUnavailable`] and [`CollectorError::UnsupportedCollector`]
///   are expected absences at build time: the host edition simply lacks the
///   subsystem, so the collector is dropped instead of failing startup.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Failed to read a file from disk.
    #[error("Failed to read file {path}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Encountered a parsing error while extracting a metric.
    #[error("Failed to parse {metric} from {location}: {reason}")]
    ParseError {
        metric: String,
        location: String,
        reason: String,
    },

    /// A required field was not present in a source.
    #[error("Missing required field: {field} in {location}")]
    MissingField { field: String, location: String },

    /// Data was found but did not conform to the expected format.
    #[error("Invalid format in {location}: {reason}")]
    InvalidFormat { location: String, reason: String },

    /// The source exists on this kind of host but currently reports nothing.
    #[error("No data available from {source_name}")]
    NoData { source_name: String },

    /// The subsystem backing a collector is not present on this host.
    #[error("Source {source_name} is not available on this host")]
    SourceUnavailable { source_name: String },

    /// A collector panicked while collecting.
    #[error("Collector {collector} panicked: {message}")]
    Panicked { collector: String, message: String },

    /// The measurement buffer was closed before the collector finished writing.
    #[error("Measurement sink closed")]
    SinkClosed,

    /// A catch-all for miscellaneous errors that don't fit other variants.
    #[error("Other error: {0}")]
    Other(String),

    /// Tried to access a collector by name, but it was not registered.
    #[error("Collector not found for: {0}")]
    CollectorNotFound(String),

    /// Tried to register a second collector under an existing name.
    #[error("Collector already registered: {0}")]
    DuplicateCollector(String),

    /// A collector is registered but cannot run on this platform.
    #[error("Unsupported collector: {0}")]
    UnsupportedCollector(String),
}

impl CollectorError {
    /// True for the "nothing to report" sentinel that must not mark a
    /// collection as failed.
    pub fn is_no_data(&self) -> bool {
        matches!(self, CollectorError::NoData { .. })
    }

    /// True for build failures caused by the host lacking an optional subsystem.
    pub fn is_expected_absence(&self) -> bool {
        matches!(
            self,
            CollectorError::SourceUnavailable { .. } | CollectorError::UnsupportedCollector(_)
        )
    }
}

/// Aggregated failure of [`Registry::initialize`](super::registry::Registry::initialize).
///
/// Holds every non-benign build error instead of only the first one, so a
/// single startup log line shows all misconfigured collectors at once.
#[derive(Error, Debug)]
#[error("failed to initialize {} collector(s): {}", .failures.len(), join_failures(.failures))]
pub struct InitializeError {
    pub failures: Vec<(String, CollectorError)>,
}

fn join_failures(failures: &[(String, CollectorError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}
