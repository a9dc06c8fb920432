//! Scrape orchestration.
//!
//! The `Executor` runs one scrape: it acquires the shared snapshot, spawns a
//! task per collector, forwards their buffered measurements until every
//! collector finished or the deadline fired, and appends the meta-measurements
//! describing the run. Collector errors, panics and slowness are contained per
//! collector; only a snapshot failure fails the scrape.

use std::{
    any::Any,
    collections::BTreeMap,
    panic::AssertUnwindSafe,
    sync::Arc,
};

use futures::FutureExt;
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{sleep_until, timeout_at, Duration, Instant},
};
use tokio_stream::{wrappers::ReceiverStream, StreamExt, StreamMap};
use tracing::{debug, error, warn};

use super::{
    collectors::{error::CollectorError, registry::Registry, traits::Collector},
    ledger::{Outcome, ScrapeLedger},
    metric::{fq_name, Completion, Event, Measurement, MetricSink},
    snapshot::{Snapshot, SnapshotProvider},
};

/// Run-level failures. Collector problems never end up here.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to acquire snapshot: {0}")]
    Snapshot(#[source] CollectorError),

    #[error("snapshot acquisition did not finish within {0:?}")]
    SnapshotTimeout(Duration),
}

/// Result of one scrape.
#[derive(Debug)]
pub struct Scrape {
    /// Collector measurements followed by meta-measurements.
    pub measurements: Vec<Measurement>,
    /// Final outcome per collector, ordered by name.
    pub outcomes: Vec<(&'static str, Outcome)>,
    pub duration: Duration,
}

impl Scrape {
    pub fn outcome(&self, name: &str) -> Option<Outcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, outcome)| *outcome)
    }
}

/// Runs scrapes against any registry view. Holds no per-scrape state, so one
/// instance serves concurrent requests.
pub struct Executor {
    namespace: Arc<str>,
    snapshots: Arc<dyn SnapshotProvider>,
    buffer_capacity: usize,
}

impl Executor {
    pub fn new(
        namespace: impl Into<Arc<str>>,
        snapshots: Arc<dyn SnapshotProvider>,
        buffer_capacity: usize,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            snapshots,
            buffer_capacity: buffer_capacity.max(1),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Runs every collector of `registry` with a deadline of `timeout` from now.
    ///
    /// Returns at most shortly after the deadline, however long collectors
    /// keep running in the background.
    pub async fn scrape(&self, registry: &Registry, timeout: Duration) -> Result<Scrape, ScrapeError> {
        let started = Instant::now();
        let deadline = started + timeout;

        let sources = registry.required_sources();
        let snapshot = match timeout_at(deadline, self.snapshots.acquire(&sources)).await {
            Ok(Ok(snapshot)) => Arc::new(snapshot),
            Ok(Err(e)) => return Err(ScrapeError::Snapshot(e)),
            Err(_) => return Err(ScrapeError::SnapshotTimeout(timeout)),
        };

        let ledger = Arc::new(ScrapeLedger::new(registry.names()));
        let mut streams = StreamMap::new();
        let collect_started = Instant::now();

        for (name, collector) in registry.iter() {
            let (tx, rx) = mpsc::channel(self.buffer_capacity);
            let sink = MetricSink::new(self.namespace.clone(), tx);
            tokio::spawn(run_collector(
                name,
                collector.clone(),
                snapshot.clone(),
                sink,
                ledger.clone(),
            ));
            streams.insert(name, ReceiverStream::new(rx));
        }

        let mut forwarder = Forwarder::new(&self.namespace);

        // Live phase: forward until everyone is done or the deadline fires.
        let expired = sleep_until(deadline);
        tokio::pin!(expired);
        loop {
            if streams.is_empty() {
                break;
            }
            let next = tokio::select! {
                next = streams.next() => next,
                _ = &mut expired => break,
            };
            match next {
                Some((name, event)) => forwarder.handle(name, event, &mut streams),
                None => break,
            }
        }

        for name in ledger.freeze() {
            let elapsed = collect_started.elapsed();
            warn!("Collector '{}' timed out after {:?}", name, elapsed);
            forwarder.push_duration(name, elapsed);
            if let Some(stream) = streams.remove(name) {
                abandon(name, stream);
            }
        }

        // Whatever is left completed before the freeze and is about to send its
        // completion record.
        while let Some((name, event)) = streams.next().await {
            forwarder.handle(name, event, &mut streams);
        }

        let outcomes = ledger.outcomes();
        forwarder.push_outcomes(&outcomes);
        let duration = started.elapsed();
        forwarder.push_scrape_duration(duration);

        Ok(Scrape {
            measurements: forwarder.measurements,
            outcomes,
            duration,
        })
    }
}

/// Body of one collector task.
async fn run_collector(
    name: &'static str,
    collector: Arc<dyn Collector>,
    snapshot: Arc<Snapshot>,
    sink: MetricSink,
    ledger: Arc<ScrapeLedger>,
) {
    let started = Instant::now();
    let result = AssertUnwindSafe(collector.collect(&snapshot, &sink))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(CollectorError::Panicked {
                collector: name.to_string(),
                message: panic_message(panic.as_ref()),
            })
        });
    let duration = started.elapsed();

    let outcome = match &result {
        Ok(()) => Outcome::Success,
        Err(e) if e.is_no_data() => Outcome::Success,
        Err(_) => Outcome::Failed,
    };

    if ledger.complete(name, outcome) {
        // Only fails when the scrape future itself was dropped.
        let _ = sink.finish(Completion { duration, result }).await;
    } else {
        debug!(
            "Collector '{}' finished after {:?}, past the scrape deadline; result discarded",
            name, duration
        );
    }
}

/// Keeps draining a timed-out collector's buffer so it never blocks on a full
/// channel. Everything received is dropped.
fn abandon(name: &'static str, stream: ReceiverStream<Event>) {
    tokio::spawn(async move {
        let mut rx = stream.into_inner();
        let mut discarded = 0usize;
        while let Some(event) = rx.recv().await {
            if let Event::Measurement(_) = event {
                discarded += 1;
            }
        }
        debug!(
            "Abandoned collector '{}' exited, {} late measurement(s) discarded",
            name, discarded
        );
    });
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Sole writer of the scrape output.
struct Forwarder<'a> {
    namespace: &'a str,
    measurements: Vec<Measurement>,
    forwarded: BTreeMap<&'static str, usize>,
}

impl<'a> Forwarder<'a> {
    fn new(namespace: &'a str) -> Self {
        Self {
            namespace,
            measurements: Vec::new(),
            forwarded: BTreeMap::new(),
        }
    }

    fn handle(
        &mut self,
        name: &'static str,
        event: Event,
        streams: &mut StreamMap<&'static str, ReceiverStream<Event>>,
    ) {
        match event {
            Event::Measurement(m) => {
                *self.forwarded.entry(name).or_default() += 1;
                self.measurements.push(m);
            }
            Event::Done(completion) => {
                streams.remove(name);
                self.log_completion(name, &completion);
                self.push_duration(name, completion.duration);
            }
        }
    }

    fn log_completion(&self, name: &str, completion: &Completion) {
        let count = self.forwarded.get(name).copied().unwrap_or_default();
        match &completion.result {
            Ok(()) => debug!(
                "Collector '{}' succeeded after {:?}, resulting in {} metrics",
                name, completion.duration, count
            ),
            Err(e) if e.is_no_data() => {
                debug!("Collector '{}' returned no data: {}", name, e)
            }
            Err(e @ CollectorError::Panicked { .. }) => error!("{}", e),
            Err(e) => warn!(
                "Collector '{}' failed after {:?}: {}",
                name, completion.duration, e
            ),
        }
    }

    fn push_duration(&mut self, name: &'static str, duration: Duration) {
        self.measurements.push(
            Measurement::gauge(
                fq_name(self.namespace, "exporter", "collector_duration_seconds"),
                "Duration of a collector scrape.",
                duration.as_secs_f64(),
            )
            .with_label("collector", name),
        );
    }

    fn push_outcomes(&mut self, outcomes: &[(&'static str, Outcome)]) {
        for (name, outcome) in outcomes {
            self.measurements.push(
                Measurement::gauge(
                    fq_name(self.namespace, "exporter", "collector_success"),
                    "Whether a collector succeeded.",
                    outcome.success_value(),
                )
                .with_label("collector", *name),
            );
            self.measurements.push(
                Measurement::gauge(
                    fq_name(self.namespace, "exporter", "collector_timeout"),
                    "Whether a collector timed out.",
                    outcome.timeout_value(),
                )
                .with_label("collector", *name),
            );
        }
    }

    fn push_scrape_duration(&mut self, duration: Duration) {
        self.measurements.push(Measurement::gauge(
            fq_name(self.namespace, "exporter", "scrape_duration_seconds"),
            "Duration of the whole scrape.",
            duration.as_secs_f64(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeSet, HashSet},
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;
    use tokio::time::sleep;
    use tracing_test::traced_test;

    use super::*;
    use crate::core::collectors::types::CollectorResult;

    const NS: &str = "test";

    /// Emits `count` gauges after `delay`.
    struct Emitting {
        count: usize,
        delay: Duration,
    }

    #[async_trait]
    impl Collector for Emitting {
        async fn collect(&self, _snapshot: &Snapshot, sink: &MetricSink) -> CollectorResult<()> {
            sleep(self.delay).await;
            for i in 0..self.count {
                sink.emit(
                    Measurement::gauge(sink.fq_name("emitting", "value"), "", i as f64)
                        .with_label("index", i.to_string()),
                )
                .await?;
            }
            Ok(())
        }
    }

    /// Sleeps, then tries to emit; records whether the late emit was accepted.
    struct Slow {
        delay: Duration,
        late_emit_ok: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Collector for Slow {
        async fn collect(&self, _snapshot: &Snapshot, sink: &MetricSink) -> CollectorResult<()> {
            sleep(self.delay).await;
            let result = sink
                .emit(Measurement::gauge(sink.fq_name("slow", "late"), "", 1.0))
                .await;
            self.late_emit_ok.store(result.is_ok(), Ordering::SeqCst);
            result
        }
    }

    struct Crashy;

    #[async_trait]
    impl Collector for Crashy {
        async fn collect(&self, _snapshot: &Snapshot, _sink: &MetricSink) -> CollectorResult<()> {
            panic!("crashy collector exploded");
        }
    }

    struct Failing;

    #[async_trait]
    impl Collector for Failing {
        async fn collect(&self, _snapshot: &Snapshot, _sink: &MetricSink) -> CollectorResult<()> {
            Err(CollectorError::Other("device went away".into()))
        }
    }

    struct Empty;

    #[async_trait]
    impl Collector for Empty {
        fn sources(&self) -> &'static [&'static str] {
            &["pressure/cpu"]
        }

        async fn collect(&self, snapshot: &Snapshot, _sink: &MetricSink) -> CollectorResult<()> {
            snapshot.require("pressure/cpu")?;
            Ok(())
        }
    }

    /// Sleeps, then writes `count` gauges; records how many were accepted and
    /// whether it got to the end.
    struct Flooding {
        delay: Duration,
        count: usize,
        accepted: Arc<AtomicUsize>,
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Collector for Flooding {
        async fn collect(&self, _snapshot: &Snapshot, sink: &MetricSink) -> CollectorResult<()> {
            sleep(self.delay).await;
            for i in 0..self.count {
                sink.emit(
                    Measurement::gauge(sink.fq_name("flooding", "value"), "", i as f64)
                        .with_label("index", i.to_string()),
                )
                .await?;
                self.accepted.fetch_add(1, Ordering::SeqCst);
            }
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Collector for Counting {
        fn sources(&self) -> &'static [&'static str] {
            &["stat"]
        }

        async fn collect(&self, _snapshot: &Snapshot, _sink: &MetricSink) -> CollectorResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct StaticProvider {
        requested: Mutex<Vec<BTreeSet<&'static str>>>,
    }

    #[async_trait]
    impl SnapshotProvider for StaticProvider {
        async fn acquire(&self, sources: &BTreeSet<&'static str>) -> CollectorResult<Snapshot> {
            self.requested.lock().unwrap().push(sources.clone());
            Ok(Snapshot::from_sources([("stat", "cpu 1 2 3 4")]))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl SnapshotProvider for FailingProvider {
        async fn acquire(&self, _sources: &BTreeSet<&'static str>) -> CollectorResult<Snapshot> {
            Err(CollectorError::Other("perf counters unavailable".into()))
        }
    }

    struct StuckProvider;

    #[async_trait]
    impl SnapshotProvider for StuckProvider {
        async fn acquire(&self, _sources: &BTreeSet<&'static str>) -> CollectorResult<Snapshot> {
            sleep(Duration::from_secs(3600)).await;
            Ok(Snapshot::empty())
        }
    }

    fn executor() -> Executor {
        Executor::new(NS, Arc::new(StaticProvider::default()), 1000)
    }

    fn meta<'a>(scrape: &'a Scrape, metric: &str, collector: &str) -> Option<&'a Measurement> {
        let name = format!("{NS}_exporter_{metric}");
        scrape
            .measurements
            .iter()
            .find(|m| m.name == name && m.label("collector") == Some(collector))
    }

    fn meta_value(scrape: &Scrape, metric: &str, collector: &str) -> f64 {
        meta(scrape, metric, collector)
            .unwrap_or_else(|| panic!("missing {metric} for {collector}"))
            .value
    }

    fn meta_signature(scrape: &Scrape) -> BTreeSet<(String, Vec<(String, String)>)> {
        scrape
            .measurements
            .iter()
            .filter(|m| m.name.starts_with(&format!("{NS}_exporter_")))
            .map(|m| (m.name.clone(), m.labels.clone()))
            .collect()
    }

    fn scenario_a_registry(late_emit_ok: Arc<AtomicBool>) -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                "fast",
                Arc::new(Emitting {
                    count: 3,
                    delay: Duration::from_millis(10),
                }),
            )
            .unwrap();
        registry
            .register(
                "slow",
                Arc::new(Slow {
                    delay: Duration::from_secs(2),
                    late_emit_ok,
                }),
            )
            .unwrap();
        registry.register("crashy", Arc::new(Crashy)).unwrap();
        registry
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn scenario_a_fast_slow_and_crashy() {
        let late_emit_ok = Arc::new(AtomicBool::new(false));
        let registry = scenario_a_registry(late_emit_ok.clone());

        let scrape = executor()
            .scrape(&registry, Duration::from_millis(500))
            .await
            .unwrap();

        let own: Vec<_> = scrape
            .measurements
            .iter()
            .filter(|m| m.name == "test_emitting_value")
            .collect();
        assert_eq!(own.len(), 3);

        assert_eq!(meta_value(&scrape, "collector_success", "fast"), 1.0);
        assert_eq!(meta_value(&scrape, "collector_timeout", "fast"), 0.0);
        assert_eq!(meta_value(&scrape, "collector_success", "crashy"), 0.0);
        assert_eq!(meta_value(&scrape, "collector_timeout", "crashy"), 0.0);
        assert_eq!(meta_value(&scrape, "collector_success", "slow"), 0.0);
        assert_eq!(meta_value(&scrape, "collector_timeout", "slow"), 1.0);

        assert_eq!(scrape.outcome("crashy"), Some(Outcome::Failed));
        assert_eq!(scrape.outcome("slow"), Some(Outcome::TimedOut));
        assert!(scrape.duration >= Duration::from_millis(500));
        assert!(scrape.duration < Duration::from_millis(510));

        assert!(logs_contain("crashy collector exploded"));
        assert!(logs_contain("Collector 'slow' timed out"));

        // the slow collector wakes up later; its write is absorbed, never delivered
        sleep(Duration::from_secs(3)).await;
        assert!(late_emit_ok.load(Ordering::SeqCst));
        assert!(!scrape.measurements.iter().any(|m| m.name == "test_slow_late"));
    }

    #[tokio::test(start_paused = true)]
    async fn meta_measurements_once_per_collector() {
        let registry = scenario_a_registry(Arc::new(AtomicBool::new(false)));

        let scrape = executor()
            .scrape(&registry, Duration::from_millis(500))
            .await
            .unwrap();

        for metric in ["collector_duration_seconds", "collector_success", "collector_timeout"] {
            for collector in ["fast", "slow", "crashy"] {
                let name = format!("{NS}_exporter_{metric}");
                let count = scrape
                    .measurements
                    .iter()
                    .filter(|m| m.name == name && m.label("collector") == Some(collector))
                    .count();
                assert_eq!(count, 1, "{metric} for {collector}");
            }
        }
        let totals = scrape
            .measurements
            .iter()
            .filter(|m| m.name == "test_exporter_scrape_duration_seconds")
            .count();
        assert_eq!(totals, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn duration_meta_follows_own_measurements() {
        let mut registry = Registry::new();
        registry
            .register(
                "fast",
                Arc::new(Emitting {
                    count: 5,
                    delay: Duration::ZERO,
                }),
            )
            .unwrap();

        let scrape = executor()
            .scrape(&registry, Duration::from_secs(1))
            .await
            .unwrap();

        let last_own = scrape
            .measurements
            .iter()
            .rposition(|m| m.name == "test_emitting_value")
            .unwrap();
        let duration_meta = scrape
            .measurements
            .iter()
            .position(|m| m.name == "test_exporter_collector_duration_seconds")
            .unwrap();
        assert!(duration_meta > last_own);

        // write order within one collector is preserved
        let indices: Vec<_> = scrape
            .measurements
            .iter()
            .filter_map(|m| m.label("index"))
            .collect();
        assert_eq!(indices, vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn buffer_smaller_than_output_still_forwards_everything() {
        let mut registry = Registry::new();
        registry
            .register(
                "chatty",
                Arc::new(Emitting {
                    count: 100,
                    delay: Duration::ZERO,
                }),
            )
            .unwrap();

        let executor = Executor::new(NS, Arc::new(StaticProvider::default()), 4);
        let scrape = executor
            .scrape(&registry, Duration::from_secs(1))
            .await
            .unwrap();

        let own = scrape
            .measurements
            .iter()
            .filter(|m| m.name == "test_emitting_value")
            .count();
        assert_eq!(own, 100);
        assert_eq!(scrape.outcome("chatty"), Some(Outcome::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn late_writer_into_full_buffer_is_drained_after_deadline() {
        let accepted = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let mut registry = Registry::new();
        registry
            .register(
                "flooding",
                Arc::new(Flooding {
                    delay: Duration::from_millis(300),
                    count: 500,
                    accepted: accepted.clone(),
                    finished: finished.clone(),
                }),
            )
            .unwrap();

        let executor = Executor::new(NS, Arc::new(StaticProvider::default()), 4);
        let scrape = executor
            .scrape(&registry, Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(scrape.outcome("flooding"), Some(Outcome::TimedOut));
        assert!(!scrape
            .measurements
            .iter()
            .any(|m| m.name == "test_flooding_value"));

        // far more than the buffer holds; only the background drain lets it finish
        sleep(Duration::from_secs(1)).await;
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(accepted.load(Ordering::SeqCst), 500);
    }

    #[tokio::test]
    async fn scenario_b_unknown_collector_runs_nothing() {
        let counting = Arc::new(Counting::default());
        let mut registry = Registry::new();
        registry.register("counting", counting.clone()).unwrap();

        let err = registry.select(&["counting", "bogus"]).unwrap_err();

        assert!(matches!(err, CollectorError::CollectorNotFound(name) if name == "bogus"));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scenario_c_snapshot_failure_aborts_scrape() {
        let counting = Arc::new(Counting::default());
        let mut registry = Registry::new();
        registry.register("counting", counting.clone()).unwrap();

        let executor = Executor::new(NS, Arc::new(FailingProvider), 1000);
        let err = executor
            .scrape(&registry, Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::Snapshot(_)));
        assert!(err.to_string().contains("perf counters unavailable"));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_snapshot_is_bounded_by_deadline() {
        let mut registry = Registry::new();
        registry
            .register("counting", Arc::new(Counting::default()))
            .unwrap();

        let executor = Executor::new(NS, Arc::new(StuckProvider), 1000);
        let started = Instant::now();
        let err = executor
            .scrape(&registry, Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::SnapshotTimeout(_)));
        assert!(started.elapsed() < Duration::from_millis(210));
    }

    #[tokio::test]
    #[traced_test]
    async fn scenario_d_no_data_counts_as_success() {
        let mut registry = Registry::new();
        registry.register("pressure", Arc::new(Empty)).unwrap();

        let scrape = executor()
            .scrape(&registry, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(scrape.outcome("pressure"), Some(Outcome::Success));
        assert_eq!(meta_value(&scrape, "collector_success", "pressure"), 1.0);
        assert!(meta(&scrape, "collector_duration_seconds", "pressure").is_some());
        // only meta-measurements: duration, success, timeout and the scrape total
        assert_eq!(scrape.measurements.len(), 4);
        assert!(logs_contain("returned no data"));
    }

    #[tokio::test]
    #[traced_test]
    async fn returned_error_marks_failure_only_for_that_collector() {
        let mut registry = Registry::new();
        registry.register("broken", Arc::new(Failing)).unwrap();
        registry
            .register("counting", Arc::new(Counting::default()))
            .unwrap();

        let scrape = executor()
            .scrape(&registry, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(meta_value(&scrape, "collector_success", "broken"), 0.0);
        assert_eq!(meta_value(&scrape, "collector_timeout", "broken"), 0.0);
        assert_eq!(meta_value(&scrape, "collector_success", "counting"), 1.0);
        assert!(logs_contain("device went away"));
    }

    #[tokio::test(start_paused = true)]
    async fn subset_emits_meta_only_for_selected() {
        let mut registry = Registry::new();
        for name in ["a", "b", "c"] {
            registry
                .register(name, Arc::new(Counting::default()))
                .unwrap();
        }
        let subset = registry.select(&["a", "c"]).unwrap();

        let scrape = executor()
            .scrape(&subset, Duration::from_secs(1))
            .await
            .unwrap();

        let reported: HashSet<_> = scrape
            .measurements
            .iter()
            .filter(|m| m.name == "test_exporter_collector_success")
            .filter_map(|m| m.label("collector"))
            .collect();
        assert_eq!(reported, HashSet::from(["a", "c"]));
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_scrapes_have_identical_meta_structure() {
        let registry = scenario_a_registry(Arc::new(AtomicBool::new(false)));
        let executor = executor();

        let first = executor
            .scrape(&registry, Duration::from_millis(500))
            .await
            .unwrap();
        let second = executor
            .scrape(&registry, Duration::from_millis(500))
            .await
            .unwrap();

        assert_eq!(meta_signature(&first), meta_signature(&second));
        assert_eq!(first.outcomes, second.outcomes);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_within_deadline_regardless_of_collector() {
        let mut registry = Registry::new();
        registry
            .register(
                "forever",
                Arc::new(Slow {
                    delay: Duration::from_secs(24 * 3600),
                    late_emit_ok: Arc::new(AtomicBool::new(false)),
                }),
            )
            .unwrap();

        let started = Instant::now();
        let scrape = executor()
            .scrape(&registry, Duration::from_millis(300))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_millis(310));
        assert_eq!(scrape.outcome("forever"), Some(Outcome::TimedOut));
        let duration = meta_value(&scrape, "collector_duration_seconds", "forever");
        assert!((0.29..0.31).contains(&duration));
    }

    #[tokio::test(start_paused = true)]
    async fn finishing_at_the_deadline_resolves_to_one_state() {
        let mut registry = Registry::new();
        registry
            .register(
                "edge",
                Arc::new(Emitting {
                    count: 1,
                    delay: Duration::from_millis(250),
                }),
            )
            .unwrap();

        let scrape = executor()
            .scrape(&registry, Duration::from_millis(250))
            .await
            .unwrap();

        let success = meta_value(&scrape, "collector_success", "edge");
        let timeout = meta_value(&scrape, "collector_timeout", "edge");
        assert_eq!(success + timeout, 1.0);
        let durations = scrape
            .measurements
            .iter()
            .filter(|m| m.name == "test_exporter_collector_duration_seconds")
            .count();
        assert_eq!(durations, 1);
    }

    #[tokio::test]
    async fn snapshot_is_acquired_once_with_union_of_sources() {
        let provider = Arc::new(StaticProvider::default());
        let mut registry = Registry::new();
        registry
            .register("one", Arc::new(Counting::default()))
            .unwrap();
        registry.register("two", Arc::new(Empty)).unwrap();
        registry
            .register("three", Arc::new(Counting::default()))
            .unwrap();

        let executor = Executor::new(NS, provider.clone(), 1000);
        executor
            .scrape(&registry, Duration::from_secs(1))
            .await
            .unwrap();

        let requested = provider.requested.lock().unwrap();
        assert_eq!(requested.len(), 1);
        assert_eq!(requested[0], BTreeSet::from(["pressure/cpu", "stat"]));
    }

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
