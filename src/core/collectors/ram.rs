use serde::{Deserialize, Serialize};

use super::{error::CollectorError, traits::Collector, types::CollectorResult};
use crate::{
    core::{
        metric::{Measurement, MetricSink},
        snapshot::Snapshot,
    },
    register_collector,
};

const SOURCE: &str = "meminfo";

/// One `/proc/meminfo` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeminfoField {
    /// Field name as the kernel prints it, e.g. `MemTotal` or `Active(anon)`.
    pub key: String,
    /// Value converted to bytes when the kernel reports `kB`, raw otherwise.
    pub value: u64,
    /// Whether the value is a byte quantity (the line carried a `kB` unit).
    pub bytes: bool,
}

/// Snapshot of system memory usage as reported by `/proc/meminfo`.
///
/// All fields are kept, in file order, so kernel-specific additions show up
/// without code changes. `MemTotal` is required; a file without it is treated
/// as malformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub fields: Vec<MeminfoField>,
}

impl MemoryStats {
    /// Parses the "key: value [unit]" format:
    /// ```text
    /// MemTotal:       16384000 kB
    /// MemFree:         8192000 kB
    /// HugePages_Total:       0
    /// ```
    /// Malformed lines are skipped.
    pub fn parse(content: &str) -> CollectorResult<Self> {
        let mut fields = Vec::with_capacity(64);

        for line in content.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let mut value_parts = rest.split_whitespace();
            let Some(Ok(raw)) = value_parts.next().map(str::parse::<u64>) else {
                continue;
            };
            let bytes = value_parts.next() == Some("kB");
            fields.push(MeminfoField {
                key: key.trim().to_string(),
                value: if bytes { raw.saturating_mul(1024) } else { raw },
                bytes,
            });
        }

        let stats = MemoryStats { fields };
        if stats.get("MemTotal").is_none() {
            return Err(CollectorError::MissingField {
                field: "MemTotal".to_string(),
                location: SOURCE.to_string(),
            });
        }
        Ok(stats)
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.fields.iter().find(|f| f.key == key).map(|f| f.value)
    }
}

/// Turns `Active(anon)` into `Active_anon`, a valid metric name fragment.
fn metric_fragment(key: &str) -> String {
    key.replace('(', "_").replace(')', "")
}

/// Collector exposing every `/proc/meminfo` field.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollector;

impl MemoryCollector {
    pub fn new() -> Self {
        MemoryCollector
    }
}

#[async_trait::async_trait]
impl Collector for MemoryCollector {
    fn sources(&self) -> &'static [&'static str] {
        &[SOURCE]
    }

    async fn collect(&self, snapshot: &Snapshot, sink: &MetricSink) -> CollectorResult<()> {
        let stats = MemoryStats::parse(snapshot.require(SOURCE)?)?;

        for field in &stats.fields {
            let suffix = if field.bytes { "_bytes" } else { "" };
            let name = sink.fq_name("memory", &format!("{}{}", metric_fragment(&field.key), suffix));
            let help = format!("Memory information field {}.", field.key);
            sink.emit(Measurement::gauge(name, help, field.value as f64))
                .await?;
        }
        Ok(())
    }
}

register_collector!(MemoryCollector, "memory");
