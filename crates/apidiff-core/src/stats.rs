//! Injected observability counters.
//!
//! A [`DiffStats`] instance is handed to the components that report into it;
//! nothing in the crate keeps process-wide counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Events counted by [`DiffStats`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counter {
    /// A structural comparison ran to completion.
    Comparisons,
    /// Raw differences produced by the engine.
    RawDifferences,
    /// Differences dropped by an ignore rule.
    IgnoredByRule,
    /// Differences dropped by the unknown-element heuristic.
    IgnoredUnknownElement,
    /// Differences dropped by a smart rule.
    IgnoredBySmartRule,
    /// Rule compilations served from the cache.
    CompileCacheHits,
    /// Rule compilations that had to be built.
    CompileCacheMisses,
    /// Pattern lookups served from the outcome cache.
    OutcomeCacheHits,
    /// Rules whose variant expansion hit the cap.
    VariantCaps,
    /// Patterns that failed to compile.
    InvalidPatterns,
    /// Revisits of an ancestor pair cut by the cycle guard.
    CycleGuards,
}

const COUNTERS: usize = 11;

impl Counter {
    fn slot(self) -> usize {
        match self {
            Self::Comparisons => 0,
            Self::RawDifferences => 1,
            Self::IgnoredByRule => 2,
            Self::IgnoredUnknownElement => 3,
            Self::IgnoredBySmartRule => 4,
            Self::CompileCacheHits => 5,
            Self::CompileCacheMisses => 6,
            Self::OutcomeCacheHits => 7,
            Self::VariantCaps => 8,
            Self::InvalidPatterns => 9,
            Self::CycleGuards => 10,
        }
    }
}

/// Thread-safe event counters.
///
/// ```
/// # use apidiff_core::{Counter, DiffStats};
/// let stats = DiffStats::default();
/// stats.incr(Counter::Comparisons);
/// stats.add(Counter::RawDifferences, 3);
/// let snapshot = stats.snapshot();
/// assert_eq!(snapshot.comparisons, 1);
/// assert_eq!(snapshot.raw_differences, 3);
/// ```
#[derive(Debug, Default)]
pub struct DiffStats {
    slots: [AtomicU64; COUNTERS],
}

impl DiffStats {
    /// Adds one to `counter`.
    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    /// Adds `amount` to `counter`.
    pub fn add(&self, counter: Counter, amount: usize) {
        let amount = u64::try_from(amount).unwrap_or(u64::MAX);
        self.slots[counter.slot()].fetch_add(amount, Ordering::Relaxed);
    }

    /// Reads a single counter.
    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        self.slots[counter.slot()].load(Ordering::Relaxed)
    }

    /// Copies every counter into a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            comparisons: self.get(Counter::Comparisons),
            raw_differences: self.get(Counter::RawDifferences),
            ignored_by_rule: self.get(Counter::IgnoredByRule),
            ignored_unknown_element: self.get(Counter::IgnoredUnknownElement),
            ignored_by_smart_rule: self.get(Counter::IgnoredBySmartRule),
            compile_cache_hits: self.get(Counter::CompileCacheHits),
            compile_cache_misses: self.get(Counter::CompileCacheMisses),
            outcome_cache_hits: self.get(Counter::OutcomeCacheHits),
            variant_caps: self.get(Counter::VariantCaps),
            invalid_patterns: self.get(Counter::InvalidPatterns),
            cycle_guards: self.get(Counter::CycleGuards),
        }
    }
}

/// Point-in-time copy of [`DiffStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct StatsSnapshot {
    pub comparisons: u64,
    pub raw_differences: u64,
    pub ignored_by_rule: u64,
    pub ignored_unknown_element: u64,
    pub ignored_by_smart_rule: u64,
    pub compile_cache_hits: u64,
    pub compile_cache_misses: u64,
    pub outcome_cache_hits: u64,
    pub variant_caps: u64,
    pub invalid_patterns: u64,
    pub cycle_guards: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counters_are_shared_across_threads() {
        let stats = Arc::new(DiffStats::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stats.incr(Counter::OutcomeCacheHits);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker thread");
        }
        assert_eq!(stats.get(Counter::OutcomeCacheHits), 400);
        assert_eq!(stats.snapshot().comparisons, 0);
    }
}
