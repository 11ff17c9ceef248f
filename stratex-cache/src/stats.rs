//! Cache statistics snapshot.

use serde::{Deserialize, Serialize};

/// Statistics about cache usage.
///
/// Counters are cumulative over the cache's lifetime; `clear()` keeps them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries physically held, including expired ones not yet
    /// discovered.
    pub size: usize,
    /// Hard capacity.
    pub capacity: usize,
    /// Number of cache hits.
    pub hit_count: u64,
    /// Number of cache misses, including expired entries found on read.
    pub miss_count: u64,
    /// `hit_count / (hit_count + miss_count)`, 0.0 before any lookup.
    pub hit_ratio: f64,
    /// Entries evicted to make room for new keys.
    pub evictions: u64,
    /// Entries dropped because their TTL had passed.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit ratio (0.0 to 1.0).
    pub fn ratio(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn lookups(&self) -> u64 {
        self.hit_count + self.miss_count
    }
}
