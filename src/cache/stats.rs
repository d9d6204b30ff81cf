//! Cache Statistics Module
//!
//! Tracks tier counters (hits, misses, evictions) and the entry census
//! reported by `stats()`.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of one tier's counters and contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted to honor the size bound
    pub evictions: u64,
    /// Entries currently held, expired or not
    pub total_entries: usize,
    /// Entries still within their TTL
    pub valid_entries: usize,
    /// Entries past their TTL but not yet removed
    pub expired_entries: usize,
    /// Configured capacity
    pub max_size: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Census ==
    /// Records the entry counts observed by a scan.
    pub fn set_census(&mut self, valid: usize, expired: usize) {
        self.valid_entries = valid;
        self.expired_entries = expired;
        self.total_entries = valid + expired;
    }
}
