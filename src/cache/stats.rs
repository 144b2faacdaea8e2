//! Cache Statistics Module
//!
//! Tracks per-operation hits, misses, dedupes and skips.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

// == Operation Stats ==
/// Counters for one cached operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    /// Reads served from storage
    pub hits: u64,
    /// Reads that had to compute (or join a computation)
    pub misses: u64,
    /// Reads that joined an in-flight computation
    pub dedupes: u64,
    /// Computed results not stored because the policy yielded no tags
    pub skips: u64,
}

impl OperationStats {
    // == Constructor ==
    /// Creates a new OperationStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    fn is_zero(&self) -> bool {
        self.hits + self.misses + self.dedupes + self.skips == 0
    }
}

/// Countable cache event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatEvent {
    Hit,
    Miss,
    Dedupe,
    Skip,
}

// == Stats Report ==
/// Snapshot of every operation's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsReport {
    pub operations: BTreeMap<String, OperationStats>,
}

impl StatsReport {
    /// Sum of all operations' counters.
    pub fn total(&self) -> OperationStats {
        self.operations
            .values()
            .fold(OperationStats::new(), |acc, s| OperationStats {
                hits: acc.hits + s.hits,
                misses: acc.misses + s.misses,
                dedupes: acc.dedupes + s.dedupes,
                skips: acc.skips + s.skips,
            })
    }

    /// True if no operation recorded anything.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

// == Operation Counters ==
/// Live atomic counters behind one operation's [`OperationStats`].
#[derive(Debug, Default)]
struct OperationCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    dedupes: AtomicU64,
    skips: AtomicU64,
}

impl OperationCounters {
    fn counter(&self, event: StatEvent) -> &AtomicU64 {
        match event {
            StatEvent::Hit => &self.hits,
            StatEvent::Miss => &self.misses,
            StatEvent::Dedupe => &self.dedupes,
            StatEvent::Skip => &self.skips,
        }
    }

    fn load(&self) -> OperationStats {
        OperationStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            dedupes: self.dedupes.load(Ordering::Relaxed),
            skips: self.skips.load(Ordering::Relaxed),
        }
    }

    fn take(&self) -> OperationStats {
        OperationStats {
            hits: self.hits.swap(0, Ordering::Relaxed),
            misses: self.misses.swap(0, Ordering::Relaxed),
            dedupes: self.dedupes.swap(0, Ordering::Relaxed),
            skips: self.skips.swap(0, Ordering::Relaxed),
        }
    }
}

// == Stats Recorder ==
/// Thread-safe per-operation counters.
///
/// Operations are registered once; after that, recording an event is a
/// shared read of the map plus one atomic increment.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    operations: DashMap<String, OperationCounters>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one event for `operation`.
    pub fn record(&self, operation: &str, event: StatEvent) {
        if let Some(counters) = self.operations.get(operation) {
            counters.counter(event).fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.operations
            .entry(operation.to_string())
            .or_default()
            .counter(event)
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Counters accumulated so far.
    pub fn snapshot(&self) -> StatsReport {
        self.collect(OperationCounters::load)
    }

    /// Counters accumulated since the previous drain; resets them.
    pub fn drain(&self) -> StatsReport {
        self.collect(OperationCounters::take)
    }

    fn collect(&self, read: impl Fn(&OperationCounters) -> OperationStats) -> StatsReport {
        let operations = self
            .operations
            .iter()
            .map(|entry| (entry.key().clone(), read(entry.value())))
            .filter(|(_, stats)| !stats.is_zero())
            .collect();
        StatsReport { operations }
    }
}
