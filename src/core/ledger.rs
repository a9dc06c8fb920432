//! Per-scrape outcome bookkeeping.
//!
//! Collector tasks report their terminal outcome with [`ScrapeLedger::complete`];
//! the executor closes the scrape with [`ScrapeLedger::freeze`] when the deadline
//! fires. Both take the same lock, so a collector finishing at the instant the
//! deadline fires ends up in exactly one terminal state.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// State of one collector within one scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Still running.
    Pending,
    /// Returned without error, or with the benign no-data sentinel.
    Success,
    /// Returned an error or panicked.
    Failed,
    /// Still running when the scrape was frozen. Its late result is discarded.
    TimedOut,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Outcome::Pending)
    }

    /// Value of the `collector_success` gauge.
    pub fn success_value(self) -> f64 {
        if self == Outcome::Success {
            1.0
        } else {
            0.0
        }
    }

    /// Value of the `collector_timeout` gauge.
    pub fn timeout_value(self) -> f64 {
        if self == Outcome::TimedOut {
            1.0
        } else {
            0.0
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Pending => "pending",
            Outcome::Success => "success",
            Outcome::Failed => "failed",
            Outcome::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct LedgerState {
    outcomes: BTreeMap<&'static str, Outcome>,
    frozen: bool,
}

/// Outcome table for one scrape. Created with every collector `Pending`.
#[derive(Debug)]
pub struct ScrapeLedger {
    state: Mutex<LedgerState>,
}

impl ScrapeLedger {
    pub fn new(names: impl IntoIterator<Item = &'static str>) -> Self {
        let outcomes = names.into_iter().map(|n| (n, Outcome::Pending)).collect();
        Self {
            state: Mutex::new(LedgerState {
                outcomes,
                frozen: false,
            }),
        }
    }

    // A panic while holding this lock cannot leave the map half-updated,
    // so the poisoned guard is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a terminal outcome for `name`.
    ///
    /// Returns `false`, leaving the ledger untouched, if the scrape is already
    /// frozen, the collector is unknown, it already has a terminal outcome, or
    /// `outcome` is `Pending`.
    pub fn complete(&self, name: &str, outcome: Outcome) -> bool {
        if !outcome.is_terminal() {
            return false;
        }
        let mut state = self.lock();
        if state.frozen {
            return false;
        }
        match state.outcomes.get_mut(name) {
            Some(current) if *current == Outcome::Pending => {
                *current = outcome;
                true
            }
            _ => false,
        }
    }

    /// Freezes the scrape: every collector still `Pending` becomes `TimedOut`
    /// and no further `complete` call is accepted. Returns the collectors that
    /// timed out. Calling it again returns an empty list.
    pub fn freeze(&self) -> Vec<&'static str> {
        let mut state = self.lock();
        if state.frozen {
            return Vec::new();
        }
        state.frozen = true;
        state
            .outcomes
            .iter_mut()
            .filter(|(_, outcome)| **outcome == Outcome::Pending)
            .map(|(name, outcome)| {
                *outcome = Outcome::TimedOut;
                *name
            })
            .collect()
    }

    pub fn is_frozen(&self) -> bool {
        self.lock().frozen
    }

    pub fn outcome(&self, name: &str) -> Option<Outcome> {
        self.lock().outcomes.get(name).copied()
    }

    /// All outcomes, ordered by collector name.
    pub fn outcomes(&self) -> Vec<(&'static str, Outcome)> {
        self.lock()
            .outcomes
            .iter()
            .map(|(name, outcome)| (*name, *outcome))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Barrier},
        thread,
    };

    use super::*;

    #[test]
    fn starts_pending() {
        let ledger = ScrapeLedger::new(["cpu", "memory"]);
        assert_eq!(ledger.outcome("cpu"), Some(Outcome::Pending));
        assert_eq!(ledger.outcome("disk"), None);
        assert!(!ledger.is_frozen());
    }

    #[test]
    fn complete_only_once() {
        let ledger = ScrapeLedger::new(["cpu"]);
        assert!(ledger.complete("cpu", Outcome::Failed));
        assert!(!ledger.complete("cpu", Outcome::Success));
        assert_eq!(ledger.outcome("cpu"), Some(Outcome::Failed));
    }

    #[test]
    fn complete_rejects_unknown_and_pending() {
        let ledger = ScrapeLedger::new(["cpu"]);
        assert!(!ledger.complete("disk", Outcome::Success));
        assert!(!ledger.complete("cpu", Outcome::Pending));
        assert_eq!(ledger.outcome("cpu"), Some(Outcome::Pending));
    }

    #[test]
    fn freeze_times_out_pending_only() {
        let ledger = ScrapeLedger::new(["fast", "slow", "crashy"]);
        ledger.complete("fast", Outcome::Success);
        ledger.complete("crashy", Outcome::Failed);

        assert_eq!(ledger.freeze(), vec!["slow"]);
        assert!(ledger.is_frozen());
        assert!(ledger.freeze().is_empty());

        assert!(!ledger.complete("slow", Outcome::Success));
        assert_eq!(
            ledger.outcomes(),
            vec![
                ("crashy", Outcome::Failed),
                ("fast", Outcome::Success),
                ("slow", Outcome::TimedOut),
            ]
        );
    }

    #[test]
    fn gauge_values_are_mutually_exclusive() {
        for outcome in [Outcome::Success, Outcome::Failed, Outcome::TimedOut] {
            assert!(outcome.success_value() + outcome.timeout_value() <= 1.0);
        }
        assert_eq!(Outcome::Success.success_value(), 1.0);
        assert_eq!(Outcome::TimedOut.timeout_value(), 1.0);
        assert_eq!(Outcome::Failed.success_value(), 0.0);
        assert_eq!(Outcome::Failed.timeout_value(), 0.0);
    }

    #[test]
    fn completion_racing_freeze_resolves_to_one_state() {
        for _ in 0..500 {
            let ledger = Arc::new(ScrapeLedger::new(["racer"]));
            let barrier = Arc::new(Barrier::new(2));

            let finisher = {
                let ledger = ledger.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    ledger.complete("racer", Outcome::Success)
                })
            };
            let freezer = {
                let ledger = ledger.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    ledger.freeze()
                })
            };

            let accepted = finisher.join().unwrap();
            let timed_out = freezer.join().unwrap();

            // exactly one side wins, and the ledger agrees with the winner
            assert_ne!(accepted, timed_out == vec!["racer"]);
            let expected = if accepted {
                Outcome::Success
            } else {
                Outcome::TimedOut
            };
            assert_eq!(ledger.outcome("racer"), Some(expected));
        }
    }
}
