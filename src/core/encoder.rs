//! Prometheus text exposition of a scrape.
//!
//! Measurements are grouped into families by name. A measurement that cannot
//! be exposed (bad name, kind mismatch with its family, duplicate label set) is
//! dropped with a warning so one misbehaving collector never breaks the page.

use std::collections::{BTreeMap, HashSet};

use prometheus::{
    proto::{self, LabelPair, MetricFamily, MetricType},
    Encoder, TextEncoder,
};
use thiserror::Error;
use tracing::warn;

use super::metric::{Measurement, MetricKind};

/// Content type of the encoded output.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to encode metrics: {0}")]
    Prometheus(#[from] prometheus::Error),
}

struct Family<'a> {
    help: &'a str,
    kind: MetricKind,
    seen: HashSet<Vec<(&'a str, &'a str)>>,
    metrics: Vec<proto::Metric>,
}

/// Encodes measurements in the text exposition format.
pub fn encode(measurements: &[Measurement]) -> Result<Vec<u8>, EncodeError> {
    let families = gather(measurements);
    let mut buffer = Vec::with_capacity(measurements.len() * 64);
    TextEncoder::new().encode(&families, &mut buffer)?;
    Ok(buffer)
}

/// Groups measurements into metric families sorted by name.
pub fn gather(measurements: &[Measurement]) -> Vec<MetricFamily> {
    let mut families: BTreeMap<&str, Family<'_>> = BTreeMap::new();

    for m in measurements {
        if !is_valid_metric_name(&m.name) {
            warn!("Skipping measurement with invalid name '{}'", m.name);
            continue;
        }
        if let Some((label, _)) = m.labels.iter().find(|(k, _)| !is_valid_label_name(k)) {
            warn!("Skipping {}: invalid label name '{}'", m.name, label);
            continue;
        }

        let mut labels: Vec<(&str, &str)> = m
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        labels.sort_unstable();
        if labels.windows(2).any(|w| w[0].0 == w[1].0) {
            warn!("Skipping {}: label names repeat", m.name);
            continue;
        }

        let family = families.entry(m.name.as_str()).or_insert_with(|| Family {
            help: &m.help,
            kind: m.kind,
            seen: HashSet::new(),
            metrics: Vec::new(),
        });
        if family.kind != m.kind {
            warn!(
                "Skipping {}: collected as {:?} but the family is a {:?}",
                m.name, m.kind, family.kind
            );
            continue;
        }
        let metric = to_proto(m.kind, m.value, &labels);
        if !family.seen.insert(labels) {
            warn!("Skipping {}: duplicate label set {:?}", m.name, m.labels);
            continue;
        }
        family.metrics.push(metric);
    }

    families
        .into_iter()
        .map(|(name, family)| {
            let mut mf = MetricFamily::default();
            mf.set_name(name.to_string());
            mf.set_help(family.help.to_string());
            mf.set_field_type(match family.kind {
                MetricKind::Gauge => MetricType::GAUGE,
                MetricKind::Counter => MetricType::COUNTER,
            });
            for metric in family.metrics {
                mf.mut_metric().push(metric);
            }
            mf
        })
        .collect()
}

fn to_proto(kind: MetricKind, value: f64, labels: &[(&str, &str)]) -> proto::Metric {
    let mut metric = proto::Metric::default();
    let mut pairs = Vec::with_capacity(labels.len());
    for (name, value) in labels {
        let mut pair = LabelPair::default();
        pair.set_name(name.to_string());
        pair.set_value(value.to_string());
        pairs.push(pair);
    }
    metric.set_label(pairs);
    match kind {
        MetricKind::Gauge => {
            let mut gauge = proto::Gauge::default();
            gauge.set_value(value);
            metric.set_gauge(gauge);
        }
        MetricKind::Counter => {
            let mut counter = proto::Counter::default();
            counter.set_value(value);
            metric.set_counter(counter);
        }
    }
    metric
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with("__")
}
