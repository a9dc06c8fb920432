use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::{
    error::{CollectorError, InitializeError},
    traits::{Collector, Host},
    types::CollectorResult,
};

/// Compile-time registration record for a collector.
/// Each collector submits a name and a factory; the registry instantiates them.
pub struct CollectorMeta {
    pub name: &'static str,
    pub factory: fn() -> Arc<dyn Collector>,
}

// Tell the `inventory` crate to collect all submitted `CollectorMeta` values.
inventory::collect!(CollectorMeta);

/// Name → collector mapping.
///
/// Built once at startup, initialized once, then shared read-only. Per-request
/// views are derived with [`Registry::select`]; they hold clones of the same
/// `Arc`s, so narrowing never re-runs `build` and never touches the source.
#[derive(Clone, Default)]
pub struct Registry {
    collectors: BTreeMap<&'static str, Arc<dyn Collector>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("collectors", &self.names())
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates every collector compiled into the binary.
    pub fn from_inventory() -> Self {
        let collectors = inventory::iter::<CollectorMeta>
            .into_iter()
            .map(|meta| (meta.name, (meta.factory)()))
            .collect();
        Self { collectors }
    }

    /// Names of every collector compiled into the binary, sorted.
    pub fn available() -> Vec<&'static str> {
        let names: BTreeSet<&'static str> = inventory::iter::<CollectorMeta>
            .into_iter()
            .map(|meta| meta.name)
            .collect();
        names.into_iter().collect()
    }

    /// Adds a collector under `name`.
    ///
    /// # Errors
    ///
    /// `CollectorError::DuplicateCollector` if the name is taken.
    pub fn register(
        &mut self,
        name: &'static str,
        collector: Arc<dyn Collector>,
    ) -> CollectorResult<()> {
        if self.collectors.contains_key(name) {
            return Err(CollectorError::DuplicateCollector(name.to_string()));
        }
        self.collectors.insert(name, collector);
        Ok(())
    }

    /// Retrieves a collector by name.
    pub fn get(&self, name: &str) -> CollectorResult<Arc<dyn Collector>> {
        self.collectors
            .get(name)
            .cloned()
            .ok_or_else(|| CollectorError::CollectorNotFound(name.to_string()))
    }

    /// Derives a registry holding exactly `names`, or everything when `names`
    /// is empty. `self` is left untouched.
    ///
    /// # Errors
    ///
    /// `CollectorError::CollectorNotFound` for the first unknown name.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> CollectorResult<Registry> {
        if names.is_empty() {
            return Ok(self.clone());
        }

        let mut collectors = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            let (key, collector) = self
                .collectors
                .get_key_value(name)
                .ok_or_else(|| CollectorError::CollectorNotFound(name.to_string()))?;
            collectors.insert(*key, collector.clone());
        }
        Ok(Registry { collectors })
    }

    /// Registered collector names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.collectors.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collectors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Arc<dyn Collector>)> {
        self.collectors.iter().map(|(name, c)| (*name, c))
    }

    /// Union of the snapshot sources of all collectors in this registry.
    pub fn required_sources(&self) -> BTreeSet<&'static str> {
        self.collectors
            .values()
            .flat_map(|c| c.sources().iter().copied())
            .collect()
    }

    /// Runs every collector's `build` concurrently.
    ///
    /// Collectors failing with an expected-absence error are logged and
    /// removed. All other failures are gathered into one `InitializeError`;
    /// the failing collectors stay registered so the caller can decide.
    pub async fn initialize(&mut self, host: &Host) -> Result<(), InitializeError> {
        let builds = self
            .collectors
            .iter()
            .map(|(name, collector)| async move { (*name, collector.build(host).await) });
        let results = join_all(builds).await;

        let mut failures = Vec::new();
        for (name, result) in results {
            match result {
                Ok(()) => debug!("Collector '{}' initialized", name),
                Err(e) if e.is_expected_absence() => {
                    warn!("Collector '{}' disabled, not available on this host: {}", name, e);
                    self.collectors.remove(name);
                }
                Err(e) => {
                    error!("Collector '{}' failed to initialize: {}", name, e);
                    failures.push((name.to_string(), e));
                }
            }
        }

        if failures.is_empty() {
            info!("{} collector(s) initialized", self.collectors.len());
            Ok(())
        } else {
            Err(InitializeError { failures })
        }
    }

    /// Calls every collector's `close` concurrently. Failures are logged only.
    pub async fn close(&self) {
        let closes = self
            .collectors
            .iter()
            .map(|(name, collector)| async move { (*name, collector.close().await) });

        for (name, result) in join_all(closes).await {
            if let Err(e) = result {
                warn!("Collector '{}' failed to close: {}", name, e);
            }
        }
    }
}

/// Macro used by collector implementations to register themselves
/// with the global inventory at compile time.
#[macro_export]
macro_rules! register_collector {
    ($collector_type:ty, $name:expr) => {
        inventory::submit! {
            $crate::core::collectors::registry::CollectorMeta {
                name: $name,
                factory: || std::sync::Arc::new(<$collector_type>::default()),
            }
        }
    };
}
