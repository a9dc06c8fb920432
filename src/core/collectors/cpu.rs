use serde::{Deserialize, Serialize};

use super::{error::CollectorError, traits::Collector, types::CollectorResult};
use crate::{
    core::{
        metric::{Measurement, MetricSink},
        snapshot::Snapshot,
    },
    register_collector,
};

const SOURCE: &str = "stat";

/// Kernel clock ticks per second (`USER_HZ`). Fixed at 100 on every
/// architecture Linux exports to userspace.
const USER_HZ: f64 = 100.0;

/// Mode names, in `/proc/stat` column order. Guest time is already
/// included in `user`/`nice` and is not exported separately.
const MODES: [&str; 8] = [
    "user", "nice", "system", "idle", "iowait", "irq", "softirq", "steal",
];

/// CPU time statistics for one core.
/// All values are in jiffies (1/100th of a second).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    /// Core index, taken from the `cpuN` label
    pub cpu: String,
    /// Jiffies per mode, ordered like [`MODES`]. Columns an older kernel
    /// does not print are zero.
    pub times: [u64; 8],
}

impl CpuStats {
    /// Parses every per-core `cpuN` line of `/proc/stat`. The aggregate `cpu`
    /// line is skipped.
    pub fn parse_all(content: &str) -> CollectorResult<Vec<Self>> {
        let mut stats = Vec::with_capacity(16);

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let Some(label) = parts.next() else {
                continue;
            };
            let Some(index) = label.strip_prefix("cpu") else {
                continue;
            };
            if index.is_empty() {
                continue;
            }
            if !index.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CollectorError::InvalidFormat {
                    location: SOURCE.to_string(),
                    reason: format!("unexpected cpu label: {}", label),
                });
            }

            let mut times = [0u64; 8];
            let mut columns = 0;
            for (slot, raw) in times.iter_mut().zip(&mut parts) {
                *slot = raw.parse().map_err(|_| CollectorError::ParseError {
                    metric: format!("{label} time"),
                    location: SOURCE.to_string(),
                    reason: format!("invalid value: {}", raw),
                })?;
                columns += 1;
            }
            if columns < 4 {
                return Err(CollectorError::InvalidFormat {
                    location: SOURCE.to_string(),
                    reason: format!("{} has only {} time columns", label, columns),
                });
            }

            stats.push(CpuStats {
                cpu: index.to_string(),
                times,
            });
        }

        if stats.is_empty() {
            return Err(CollectorError::MissingField {
                field: "cpuN".to_string(),
                location: SOURCE.to_string(),
            });
        }
        Ok(stats)
    }

    /// Seconds spent per mode.
    pub fn seconds(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        MODES
            .iter()
            .zip(self.times.iter())
            .map(|(mode, jiffies)| (*mode, *jiffies as f64 / USER_HZ))
    }
}

/// The CPU collector, reading per-core times from /proc/stat.
#[derive(Debug, Clone, Default)]
pub struct CpuCollector;

impl CpuCollector {
    pub fn new() -> Self {
        CpuCollector
    }
}

#[async_trait::async_trait]
impl Collector for CpuCollector {
    fn sources(&self) -> &'static [&'static str] {
        &[SOURCE]
    }

    async fn collect(&self, snapshot: &Snapshot, sink: &MetricSink) -> CollectorResult<()> {
        let cores = CpuStats::parse_all(snapshot.require(SOURCE)?)?;
        let name = sink.fq_name("cpu", "time_seconds_total");

        for core in &cores {
            for (mode, seconds) in core.seconds() {
                sink.emit(
                    Measurement::counter(
                        name.clone(),
                        "Seconds the CPUs spent in each mode.",
                        seconds,
                    )
                    .with_label("cpu", core.cpu.clone())
                    .with_label("mode", mode),
                )
                .await?;
            }
        }
        Ok(())
    }
}

register_collector!(CpuCollector, "cpu");
