use serde::{Deserialize, Serialize};

use super::{error::CollectorError, traits::Collector, types::CollectorResult};
use crate::{
    core::{
        metric::{Measurement, MetricSink},
        snapshot::Snapshot,
    },
    register_collector,
};

const SOURCE: &str = "loadavg";

/// System load average information over different time windows.
/// Load average represents the average number of processes that are either
/// in the CPU runnable queue or blocked on I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    /// Average system load over the last 1 minute
    pub one_minute: f64,
    /// Average system load over the last 5 minutes
    pub five_minutes: f64,
    /// Average system load over the last 15 minutes
    pub fifteen_minutes: f64,
    /// Number of processes currently running on the CPU
    pub running_processes: u32,
    /// Total number of processes in the system
    pub total_processes: u32,
}

impl LoadAverage {
    /// Parses the contents of `/proc/loadavg`.
    ///
    /// Expected format: `"1.23 1.45 1.67 1/234 12345"`.
    pub fn parse(content: &str) -> CollectorResult<Self> {
        let parts: Vec<&str> = content.split_whitespace().collect();
        if parts.len() < 5 {
            return Err(CollectorError::InvalidFormat {
                location: SOURCE.to_string(),
                reason: "Expected at least 5 fields".to_string(),
            });
        }

        let (running, total) =
            parts[3]
                .split_once('/')
                .ok_or_else(|| CollectorError::InvalidFormat {
                    location: SOURCE.to_string(),
                    reason: "process field must be in format 'running/total'".to_string(),
                })?;

        Ok(LoadAverage {
            one_minute: parse_field("one_minute", parts[0])?,
            five_minutes: parse_field("five_minutes", parts[1])?,
            fifteen_minutes: parse_field("fifteen_minutes", parts[2])?,
            running_processes: parse_field("running_processes", running)?,
            total_processes: parse_field("total_processes", total)?,
        })
    }
}

fn parse_field<T: std::str::FromStr>(metric: &str, raw: &str) -> CollectorResult<T> {
    raw.parse::<T>().map_err(|_| CollectorError::ParseError {
        metric: metric.to_string(),
        location: SOURCE.to_string(),
        reason: format!("invalid value: {}", raw),
    })
}

/// Collector for system load average statistics from /proc/loadavg.
#[derive(Debug, Clone, Default)]
pub struct LoadAverageCollector;

impl LoadAverageCollector {
    pub fn new() -> Self {
        LoadAverageCollector
    }
}

#[async_trait::async_trait]
impl Collector for LoadAverageCollector {
    fn sources(&self) -> &'static [&'static str] {
        &[SOURCE]
    }

    async fn collect(&self, snapshot: &Snapshot, sink: &MetricSink) -> CollectorResult<()> {
        let load = LoadAverage::parse(snapshot.require(SOURCE)?)?;

        let gauges = [
            ("load1", "1m load average.", load.one_minute),
            ("load5", "5m load average.", load.five_minutes),
            ("load15", "15m load average.", load.fifteen_minutes),
            (
                "procs_running",
                "Number of runnable scheduling entities.",
                f64::from(load.running_processes),
            ),
            (
                "procs_total",
                "Number of existing scheduling entities.",
                f64::from(load.total_processes),
            ),
        ];
        for (name, help, value) in gauges {
            sink.emit(Measurement::gauge(sink.fq_name("", name), help, value))
                .await?;
        }
        Ok(())
    }
}

register_collector!(LoadAverageCollector, "loadavg");
