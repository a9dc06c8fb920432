//! Readiness state of the exporter.
//!
//! The exporter is `Unknown` until its collectors are initialized and the
//! listener is bound, `Ready` while serving, and `ShuttingDown` once a stop
//! signal arrived. `/health` reports the current state; scrapes are refused
//! unless the state is `Ready`.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    Ready,
    /// Startup is in progress; the reason names the current step.
    NotReadyYet(String),
    /// Stop signal received; in-flight scrapes are finishing.
    ShuttingDown,
    Unknown,
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready)
    }

    /// Variant name without the reason.
    pub fn name(&self) -> &'static str {
        match self {
            ReadinessState::Ready => "Ready",
            ReadinessState::NotReadyYet(_) => "NotReadyYet",
            ReadinessState::ShuttingDown => "ShuttingDown",
            ReadinessState::Unknown => "Unknown",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ReadinessState::NotReadyYet(reason) => Some(reason),
            _ => None,
        }
    }

    /// Body of the `/health` response for this state.
    pub fn report(&self) -> HealthReport {
        HealthReport {
            status: if self.is_ready() { "ok" } else { self.name() },
            reason: self.reason().map(str::to_owned),
        }
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{} ({})", self.name(), reason),
            None => f.write_str(self.name()),
        }
    }
}

/// JSON body served by `/health`: `{"status":"ok"}` when ready, otherwise the
/// state name plus the reason if there is one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared readiness tracker. Clones observe and update the same state.
#[derive(Debug, Clone)]
pub struct Readiness {
    tx: watch::Sender<ReadinessState>,
}

impl Readiness {
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(ReadinessState::Unknown),
        }
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.tx.subscribe()
    }

    pub fn current_state(&self) -> ReadinessState {
        self.tx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_ready()
    }

    /// Replaces the state. Changes are logged at debug level.
    pub fn set_state(&self, state: ReadinessState) {
        let previous = self.tx.send_replace(state);
        let current = self.tx.borrow();
        if previous != *current {
            debug!("Readiness changed: {} -> {}", previous, *current);
        }
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}
