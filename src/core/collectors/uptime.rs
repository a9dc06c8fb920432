use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::{error::CollectorError, traits::Collector, types::CollectorResult};
use crate::{
    core::{
        metric::{Measurement, MetricSink},
        snapshot::Snapshot,
    },
    register_collector,
};

const SOURCE: &str = "uptime";

/// System uptime information from `/proc/uptime`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UptimeInfo {
    /// Seconds since boot
    pub uptime_seconds: f64,
    /// Sum of idle time over all cores, in seconds
    pub idle_seconds: f64,
}

impl UptimeInfo {
    /// Parses `"12345.67 54321.00"`.
    pub fn parse(content: &str) -> CollectorResult<Self> {
        let mut parts = content.split_whitespace();
        let mut next = |metric: &str| -> CollectorResult<f64> {
            let raw = parts.next().ok_or_else(|| CollectorError::MissingField {
                field: metric.to_string(),
                location: SOURCE.to_string(),
            })?;
            raw.parse().map_err(|_| CollectorError::ParseError {
                metric: metric.to_string(),
                location: SOURCE.to_string(),
                reason: format!("invalid value: {}", raw),
            })
        };

        Ok(UptimeInfo {
            uptime_seconds: next("uptime_seconds")?,
            idle_seconds: next("idle_seconds")?,
        })
    }

    /// Boot time as seconds since the epoch, relative to `now`.
    pub fn boot_time(&self, now: SystemTime) -> CollectorResult<f64> {
        let now = now
            .duration_since(UNIX_EPOCH)
            .map_err(|e| CollectorError::Other(format!("system clock before epoch: {e}")))?;
        Ok((now.as_secs_f64() - self.uptime_seconds).floor())
    }
}

/// Exposes uptime and the derived boot time.
#[derive(Debug, Clone, Default)]
pub struct UptimeCollector;

impl UptimeCollector {
    pub fn new() -> Self {
        UptimeCollector
    }
}

#[async_trait::async_trait]
impl Collector for UptimeCollector {
    fn sources(&self) -> &'static [&'static str] {
        &[SOURCE]
    }

    async fn collect(&self, snapshot: &Snapshot, sink: &MetricSink) -> CollectorResult<()> {
        let info = UptimeInfo::parse(snapshot.require(SOURCE)?)?;
        // relative to when the sources were read, not to when this task ran
        let boot_time = info.boot_time(snapshot.taken_at())?;

        sink.emit(Measurement::gauge(
            sink.fq_name("", "uptime_seconds"),
            "System uptime in seconds.",
            info.uptime_seconds,
        ))
        .await?;
        sink.emit(Measurement::gauge(
            sink.fq_name("", "boot_time_seconds"),
            "Node boot time, in unixtime.",
            boot_time,
        ))
        .await
    }
}

register_collector!(UptimeCollector, "uptime");
