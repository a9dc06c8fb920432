//! Point-in-time snapshot of procfs sources shared by all collectors of one scrape.
//!
//! Reading a source once per scrape instead of once per collector keeps the
//! cost of overlapping collectors flat. The snapshot is immutable after
//! acquisition and is dropped with the scrape that created it.

use std::{
    collections::{BTreeSet, HashMap},
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use futures::future::try_join_all;
use tracing::{debug, trace};

use super::collectors::{error::CollectorError, types::CollectorResult};

/// `EOPNOTSUPP`: returned by e.g. `/proc/pressure/*` when PSI is compiled in but disabled.
const EOPNOTSUPP: i32 = 95;

/// Raw source contents keyed by source name (a path relative to the procfs root).
#[derive(Debug, Clone)]
pub struct Snapshot {
    taken_at: SystemTime,
    sources: HashMap<String, String>,
}

impl Snapshot {
    /// Creates a snapshot from already-read sources.
    pub fn from_sources<I, K, V>(sources: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            taken_at: SystemTime::now(),
            sources: sources
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// An empty snapshot, for scrapes whose collectors read nothing.
    pub fn empty() -> Self {
        Self::from_sources(std::iter::empty::<(String, String)>())
    }

    pub fn taken_at(&self) -> SystemTime {
        self.taken_at
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.sources.get(source).map(String::as_str)
    }

    /// Returns the source contents, or the benign `NoData` error when the host
    /// does not provide it.
    pub fn require(&self, source: &str) -> CollectorResult<&str> {
        self.get(source).ok_or_else(|| CollectorError::NoData {
            source_name: source.to_string(),
        })
    }

    pub fn contains(&self, source: &str) -> bool {
        self.sources.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Produces one snapshot per scrape.
#[async_trait::async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Reads every requested source. Fails the whole scrape on error.
    async fn acquire(&self, sources: &BTreeSet<&'static str>) -> CollectorResult<Snapshot>;
}

/// Reads sources from a procfs mount (`/proc` unless configured otherwise).
#[derive(Debug, Clone)]
pub struct ProcfsSnapshotProvider {
    root: PathBuf,
}

impl ProcfsSnapshotProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_source(&self, source: &'static str) -> CollectorResult<Option<(String, String)>> {
        let path = self.root.join(source);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some((source.to_string(), content))),
            Err(e) if is_absent(&e) => {
                trace!("Source {} not present on this host: {}", path.display(), e);
                Ok(None)
            }
            Err(source) => Err(CollectorError::FileRead {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

impl Default for ProcfsSnapshotProvider {
    fn default() -> Self {
        Self::new("/proc")
    }
}

#[async_trait::async_trait]
impl SnapshotProvider for ProcfsSnapshotProvider {
    async fn acquire(&self, sources: &BTreeSet<&'static str>) -> CollectorResult<Snapshot> {
        let reads = sources.iter().copied().map(|source| self.read_source(source));
        let sources: Vec<_> = try_join_all(reads).await?.into_iter().flatten().collect();
        debug!("Snapshot acquired with {} source(s)", sources.len());
        Ok(Snapshot::from_sources(sources))
    }
}

fn is_absent(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::Unsupported)
        || e.raw_os_error() == Some(EOPNOTSUPP)
}
