use super::error::CollectorError;

/// Result type returned by collectors, the registry and the snapshot provider.
///
/// Every fallible step between "read a procfs source" and "hand a measurement
/// to the sink" reports a `CollectorError`, so the executor can classify the
/// outcome (benign no-data, expected absence, real failure) in one place.
pub type CollectorResult<T> = std::result::Result<T, CollectorError>;
