//! Cache Statistics Module
//!
//! Counters for the cache service and the snapshot handed to callers.

use serde::Serialize;

// == Cache Stats ==
/// Running counters, mutated under the cache service lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from memory
    pub memory_hits: u64,
    /// Reads that went to the remote resource
    pub api_calls: u64,
    /// Entries dropped as stale or by explicit invalidation
    pub cache_invalidations: u64,
    /// Successful disk flushes
    pub cache_saves: u64,
    /// Reads passed straight through while caching was disabled
    pub passthrough_reads: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_reads(&self) -> u64 {
        self.memory_hits + self.api_calls
    }

    // == Hit Rate ==
    /// Memory hits as a percentage of cached reads, or 0.0 before any read.
    pub fn memory_hit_rate_pct(&self) -> f64 {
        let total = self.total_reads();
        if total == 0 {
            0.0
        } else {
            self.memory_hits as f64 / total as f64 * 100.0
        }
    }

    pub fn record_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn record_api_call(&mut self) {
        self.api_calls += 1;
    }

    pub fn record_invalidations(&mut self, count: usize) {
        self.cache_invalidations += count as u64;
    }

    pub fn record_save(&mut self) {
        self.cache_saves += 1;
    }

    pub fn record_passthrough(&mut self) {
        self.passthrough_reads += 1;
    }
}

// == Cache Statistics ==
/// Snapshot returned by `CacheService::get_cache_statistics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatistics {
    pub enabled: bool,
    pub total_reads: u64,
    pub memory_hits: u64,
    pub api_calls: u64,
    pub memory_hit_rate_pct: f64,
    pub api_calls_saved: u64,
    pub savings_percentage: f64,
    pub cache_invalidations: u64,
    pub cache_saves: u64,
    pub passthrough_reads: u64,
    pub current_cache_size: usize,
    pub max_cache_size: usize,
}

impl CacheStatistics {
    pub fn from_stats(stats: &CacheStats, enabled: bool, current: usize, max: usize) -> Self {
        let hit_rate = round2(stats.memory_hit_rate_pct());
        Self {
            enabled,
            total_reads: stats.total_reads(),
            memory_hits: stats.memory_hits,
            api_calls: stats.api_calls,
            memory_hit_rate_pct: hit_rate,
            api_calls_saved: stats.memory_hits,
            savings_percentage: hit_rate,
            cache_invalidations: stats.cache_invalidations,
            cache_saves: stats.cache_saves,
            passthrough_reads: stats.passthrough_reads,
            current_cache_size: current,
            max_cache_size: max,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
