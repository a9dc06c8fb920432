use serde::{Deserialize, Serialize};

use super::{error::CollectorError, traits::Collector, types::CollectorResult};
use crate::{
    core::{
        metric::{Measurement, MetricSink},
        snapshot::Snapshot,
    },
    register_collector,
};

const AVAILABLE: &str = "sys/kernel/random/entropy_avail";
const POOL_SIZE: &str = "sys/kernel/random/poolsize";

/// System entropy pool statistics, in bits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntropyStats {
    /// Bits of entropy currently available in the kernel's pool.
    pub available_entropy: u32,
    /// Pool size. Absent on some kernels.
    pub pool_size: Option<u32>,
}

fn parse_bits(location: &str, content: &str) -> CollectorResult<u32> {
    content
        .trim()
        .parse::<u32>()
        .map_err(|_| CollectorError::ParseError {
            metric: location.rsplit('/').next().unwrap_or(location).to_string(),
            location: location.to_string(),
            reason: "invalid integer format".to_string(),
        })
}

/// Collector for the kernel entropy pool.
#[derive(Debug, Clone, Default)]
pub struct EntropyCollector;

impl EntropyCollector {
    pub fn new() -> Self {
        EntropyCollector
    }
}

#[async_trait::async_trait]
impl Collector for EntropyCollector {
    fn sources(&self) -> &'static [&'static str] {
        &[AVAILABLE, POOL_SIZE]
    }

    async fn collect(&self, snapshot: &Snapshot, sink: &MetricSink) -> CollectorResult<()> {
        let stats = EntropyStats {
            available_entropy: parse_bits(AVAILABLE, snapshot.require(AVAILABLE)?)?,
            pool_size: snapshot
                .get(POOL_SIZE)
                .map(|content| parse_bits(POOL_SIZE, content))
                .transpose()?,
        };

        sink.emit(Measurement::gauge(
            sink.fq_name("entropy", "available_bits"),
            "Bits of available entropy.",
            f64::from(stats.available_entropy),
        ))
        .await?;
        if let Some(pool_size) = stats.pool_size {
            sink.emit(Measurement::gauge(
                sink.fq_name("entropy", "pool_size_bits"),
                "Bits of entropy pool.",
                f64::from(pool_size),
            ))
            .await?;
        }
        Ok(())
    }
}

register_collector!(EntropyCollector, "entropy");
