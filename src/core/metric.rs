//! Measurements and the per-collector sink they are written to.
//!
//! A collector never sees the scrape output directly. It gets a [`MetricSink`],
//! a handle to a bounded channel owned by the executor. The executor forwards
//! buffered measurements into the scrape result while the scrape is live and
//! throws them away once the collector has been abandoned.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::sync::mpsc;

use super::collectors::{error::CollectorError, types::CollectorResult};

/// Prometheus metric type of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// A single sample: `name{labels} value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub value: f64,
    pub labels: Vec<(String, String)>,
}

impl Measurement {
    pub fn gauge(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(name, help, MetricKind::Gauge, value)
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self::new(name, help, MetricKind::Counter, value)
    }

    fn new(name: impl Into<String>, help: impl Into<String>, kind: MetricKind, value: f64) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            value,
            labels: Vec::new(),
        }
    }

    /// Adds a label pair, builder style.
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((name.into(), value.into()));
        self
    }

    /// Returns the value of label `name`, if set.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// How a single collection ended, as seen by the collector task.
#[derive(Debug)]
pub(crate) struct Completion {
    pub duration: Duration,
    pub result: CollectorResult<()>,
}

/// What travels through a collector's buffer. `Done` is always the last event.
#[derive(Debug)]
pub(crate) enum Event {
    Measurement(Measurement),
    Done(Completion),
}

/// Write handle for one collector in one scrape.
///
/// Cloning is cheap; all clones feed the same bounded buffer. `emit` waits when
/// the buffer is full, which is the back-pressure a collector is allowed to see.
#[derive(Debug, Clone)]
pub struct MetricSink {
    namespace: Arc<str>,
    tx: mpsc::Sender<Event>,
}

impl MetricSink {
    pub(crate) fn new(namespace: Arc<str>, tx: mpsc::Sender<Event>) -> Self {
        Self { namespace, tx }
    }

    /// Metric namespace prefix for this exporter (e.g. `blazebee`).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Builds a fully qualified metric name: `<namespace>_<subsystem>_<name>`.
    /// An empty subsystem is skipped.
    pub fn fq_name(&self, subsystem: &str, name: &str) -> String {
        fq_name(&self.namespace, subsystem, name)
    }

    /// Queues a measurement for forwarding.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::SinkClosed` if the scrape side is gone entirely,
    /// which only happens when the runtime is shutting down.
    pub async fn emit(&self, measurement: Measurement) -> CollectorResult<()> {
        self.tx
            .send(Event::Measurement(measurement))
            .await
            .map_err(|_| CollectorError::SinkClosed)
    }

    pub(crate) async fn finish(&self, completion: Completion) -> CollectorResult<()> {
        self.tx
            .send(Event::Done(completion))
            .await
            .map_err(|_| CollectorError::SinkClosed)
    }
}

pub(crate) fn fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}
