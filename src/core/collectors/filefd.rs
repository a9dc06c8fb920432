use serde::{Deserialize, Serialize};

use super::{error::CollectorError, traits::Collector, types::CollectorResult};
use crate::{
    core::{
        metric::{Measurement, MetricSink},
        snapshot::Snapshot,
    },
    register_collector,
};

const SOURCE: &str = "sys/fs/file-nr";

/// File handle usage from `/proc/sys/fs/file-nr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFdStats {
    /// Number of allocated file handles
    pub allocated: u64,
    /// Allocated but unused handles (always 0 on kernels since 2.6)
    pub unused: u64,
    /// System-wide limit (`fs.file-max`)
    pub maximum: u64,
}

impl FileFdStats {
    /// Parses the three whitespace-separated counters of `file-nr`.
    pub fn parse(content: &str) -> CollectorResult<Self> {
        let parts: Vec<&str> = content.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(CollectorError::InvalidFormat {
                location: SOURCE.to_string(),
                reason: format!("expected 3 fields, got {}", parts.len()),
            });
        }

        let field = |metric: &str, raw: &str| {
            raw.parse::<u64>().map_err(|_| CollectorError::ParseError {
                metric: metric.to_string(),
                location: SOURCE.to_string(),
                reason: format!("invalid value: {}", raw),
            })
        };

        Ok(FileFdStats {
            allocated: field("allocated", parts[0])?,
            unused: field("unused", parts[1])?,
            maximum: field("maximum", parts[2])?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilefdCollector;

impl FilefdCollector {
    pub fn new() -> Self {
        FilefdCollector
    }
}

#[async_trait::async_trait]
impl Collector for FilefdCollector {
    fn sources(&self) -> &'static [&'static str] {
        &[SOURCE]
    }

    async fn collect(&self, snapshot: &Snapshot, sink: &MetricSink) -> CollectorResult<()> {
        let stats = FileFdStats::parse(snapshot.require(SOURCE)?)?;

        sink.emit(Measurement::gauge(
            sink.fq_name("filefd", "allocated"),
            "File descriptor statistics: allocated.",
            stats.allocated as f64,
        ))
        .await?;
        sink.emit(Measurement::gauge(
            sink.fq_name("filefd", "maximum"),
            "File descriptor statistics: maximum.",
            stats.maximum as f64,
        ))
        .await
    }
}

register_collector!(FilefdCollector, "filefd");
