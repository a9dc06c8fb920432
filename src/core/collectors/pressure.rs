use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    error::CollectorError,
    traits::{Collector, Host},
    types::CollectorResult,
};
use crate::{
    core::{
        metric::{Measurement, MetricSink},
        snapshot::Snapshot,
    },
    register_collector,
};

const RESOURCES: [&str; 3] = ["cpu", "memory", "io"];
const SOURCES: [&str; 3] = ["pressure/cpu", "pressure/memory", "pressure/io"];

/// One line of a PSI file, e.g.
/// `some avg10=0.12 avg60=0.05 avg300=0.01 total=123456`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PressureLine {
    /// Share of time stalled, averaged over 10 seconds, in percent
    pub avg10: f64,
    /// Same over 60 seconds
    pub avg60: f64,
    /// Same over 300 seconds
    pub avg300: f64,
    /// Total stall time in microseconds
    pub total: u64,
}

/// Pressure stall information for one resource.
/// The "some" line tracks time at least one task was stalled, the "full"
/// line time all non-idle tasks were stalled at once. Older kernels do not
/// print "full" for cpu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureStats {
    /// "cpu", "memory" or "io"
    pub resource: String,
    pub some: PressureLine,
    pub full: Option<PressureLine>,
}

impl PressureStats {
    /// Parses the content of a pressure file.
    pub fn parse(resource: &str, content: &str) -> CollectorResult<Self> {
        let location = format!("pressure/{resource}");
        let mut some = None;
        let mut full = None;

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let slot = match parts.next() {
                Some("some") => &mut some,
                Some("full") => &mut full,
                _ => continue,
            };

            let mut parsed = PressureLine::default();
            for part in parts {
                let Some((key, raw)) = part.split_once('=') else {
                    continue;
                };
                let invalid = || CollectorError::ParseError {
                    metric: format!("pressure_{key}"),
                    location: location.clone(),
                    reason: format!("invalid value: {}", part),
                };
                match key {
                    "avg10" => parsed.avg10 = raw.parse().map_err(|_| invalid())?,
                    "avg60" => parsed.avg60 = raw.parse().map_err(|_| invalid())?,
                    "avg300" => parsed.avg300 = raw.parse().map_err(|_| invalid())?,
                    "total" => parsed.total = raw.parse().map_err(|_| invalid())?,
                    _ => {}
                }
            }
            *slot = Some(parsed);
        }

        let some = some.ok_or_else(|| CollectorError::MissingField {
            field: "some".to_string(),
            location: location.clone(),
        })?;
        Ok(PressureStats {
            resource: resource.to_string(),
            some,
            full,
        })
    }

    fn lines(&self) -> impl Iterator<Item = (&'static str, &PressureLine)> {
        std::iter::once(("some", &self.some)).chain(self.full.iter().map(|full| ("full", full)))
    }
}

/// Reads CPU, memory and I/O pressure from `/proc/pressure`.
#[derive(Debug, Clone, Default)]
pub struct PressureCollector;

impl PressureCollector {
    pub fn new() -> Self {
        PressureCollector
    }
}

#[async_trait::async_trait]
impl Collector for PressureCollector {
    fn sources(&self) -> &'static [&'static str] {
        &SOURCES
    }

    async fn build(&self, host: &Host) -> CollectorResult<()> {
        let dir = host.procfs_path("pressure");
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(CollectorError::SourceUnavailable {
                source_name: dir.display().to_string(),
            }),
        }
    }

    async fn collect(&self, snapshot: &Snapshot, sink: &MetricSink) -> CollectorResult<()> {
        let stalled = sink.fq_name("pressure", "stalled_seconds_total");
        let ratio = sink.fq_name("pressure", "ratio");
        let mut found = 0;

        for (resource, source) in RESOURCES.iter().zip(SOURCES) {
            // PSI can be compiled in but disabled per resource
            let Some(content) = snapshot.get(source) else {
                debug!("Pressure source {} not present", source);
                continue;
            };
            let stats = PressureStats::parse(resource, content)?;
            found += 1;

            for (kind, line) in stats.lines() {
                sink.emit(
                    Measurement::counter(
                        stalled.clone(),
                        "Total time tasks were stalled on the resource.",
                        line.total as f64 / 1_000_000.0,
                    )
                    .with_label("resource", *resource)
                    .with_label("kind", kind),
                )
                .await?;

                for (window, avg) in [("10s", line.avg10), ("60s", line.avg60), ("300s", line.avg300)] {
                    sink.emit(
                        Measurement::gauge(
                            ratio.clone(),
                            "Share of time tasks were stalled, averaged over the window.",
                            avg / 100.0,
                        )
                        .with_label("resource", *resource)
                        .with_label("kind", kind)
                        .with_label("window", window),
                    )
                    .await?;
                }
            }
        }

        if found == 0 {
            return Err(CollectorError::NoData {
                source_name: "pressure".to_string(),
            });
        }
        Ok(())
    }
}

register_collector!(PressureCollector, "pressure");

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::core::collectors::testing::{collect, value};

    const CPU: &str = "some avg10=1.50 avg60=0.50 avg300=0.10 total=2500000\n";
    const MEMORY: &str = "\
some avg10=0.00 avg60=0.00 avg300=0.00 total=100
full avg10=0.00 avg60=0.00 avg300=0.00 total=50
";

    #[test]
    fn test_parse_some_and_full() {
        let stats = PressureStats::parse("memory", MEMORY).unwrap();
        assert_eq!(stats.some.total, 100);
        assert_eq!(stats.full.as_ref().map(|f| f.total), Some(50));

        let cpu = PressureStats::parse("cpu", CPU).unwrap();
        assert_eq!(cpu.some.avg10, 1.5);
        assert!(cpu.full.is_none());
    }

    #[test]
    fn test_parse_requires_some_line() {
        let err = PressureStats::parse("io", "full avg10=0.00 total=1\n").unwrap_err();
        assert!(matches!(err, CollectorError::MissingField { .. }));
    }

    #[test]
    fn test_parse_rejects_bad_value() {
        let err = PressureStats::parse("io", "some avg10=lots total=1\n").unwrap_err();
        assert!(matches!(err, CollectorError::ParseError { ref metric, .. } if metric == "pressure_avg10"));
    }

    #[tokio::test]
    async fn test_collect_present_resources_only() {
        let out = collect(
            &PressureCollector,
            &[("pressure/cpu", CPU), ("pressure/memory", MEMORY)],
        )
        .await
        .unwrap();

        assert_eq!(
            value(
                &out,
                "test_pressure_stalled_seconds_total",
                &[("resource", "cpu"), ("kind", "some")]
            ),
            Some(2.5)
        );
        assert_eq!(
            value(
                &out,
                "test_pressure_ratio",
                &[("resource", "cpu"), ("kind", "some"), ("window", "10s")]
            ),
            Some(0.015)
        );
        assert!(value(
            &out,
            "test_pressure_stalled_seconds_total",
            &[("resource", "memory"), ("kind", "full")]
        )
        .is_some());
        assert!(!out.iter().any(|m| m.label("resource") == Some("io")));
        // cpu: some; memory: some + full; each line is one counter and three ratios
        assert_eq!(out.len(), 3 * 4);
    }

    #[tokio::test]
    async fn test_collect_with_nothing_present_is_no_data() {
        let err = collect(&PressureCollector, &[]).await.unwrap_err();
        assert!(err.is_no_data());
    }

    #[tokio::test]
    async fn test_build_requires_pressure_dir() {
        let dir = tempfile::tempdir().unwrap();
        let host = Host::new(dir.path());

        let err = PressureCollector.build(&host).await.unwrap_err();
        assert!(err.is_expected_absence());

        fs::create_dir(dir.path().join("pressure")).unwrap();
        PressureCollector.build(&host).await.unwrap();
    }
}
