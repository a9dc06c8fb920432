use std::path::{Path, PathBuf};

use super::types::CollectorResult;
use crate::core::{metric::MetricSink, snapshot::Snapshot};

/// Platform handle passed to [`Collector::build`].
///
/// Collectors probe the host through it instead of hard-coding `/proc`, which
/// lets tests and containerised deployments point them at another mount.
#[derive(Debug, Clone)]
pub struct Host {
    procfs_root: PathBuf,
}

impl Host {
    pub fn new(procfs_root: impl Into<PathBuf>) -> Self {
        Self {
            procfs_root: procfs_root.into(),
        }
    }

    pub fn procfs_root(&self) -> &Path {
        &self.procfs_root
    }

    /// Absolute path of a procfs source, e.g. `pressure/cpu`.
    pub fn procfs_path(&self, source: &str) -> PathBuf {
        self.procfs_root.join(source)
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new("/proc")
    }
}

/// The contract every metric collector implements.
///
/// A collector is a small read-and-map unit: it takes the sources it declared
/// in [`sources`](Collector::sources) from the scrape's shared [`Snapshot`],
/// turns them into measurements and writes them to the [`MetricSink`].
///
/// The executor treats `collect` as opaque. It may be slow, return an error or
/// panic; none of that affects other collectors in the same scrape. Collectors
/// are shared between concurrent scrapes, so any state they keep must be
/// behind interior mutability.
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Snapshot sources this collector reads, relative to the procfs root.
    fn sources(&self) -> &'static [&'static str] {
        &[]
    }

    /// One-time setup at startup.
    ///
    /// Return `CollectorError::SourceUnavailable` when the host lacks the
    /// subsystem; the registry then drops the collector instead of failing.
    async fn build(&self, _host: &Host) -> CollectorResult<()> {
        Ok(())
    }

    /// Collects one round of measurements.
    async fn collect(&self, snapshot: &Snapshot, sink: &MetricSink) -> CollectorResult<()>;

    /// Releases resources. Called once at shutdown, never per scrape.
    async fn close(&self) -> CollectorResult<()> {
        Ok(())
    }
}
