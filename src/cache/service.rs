//! Cache Service Module
//!
//! Dual-layer (memory + disk) cache in front of a remote tabular resource,
//! invalidated by the resource's modification time.
//!
//! Locking: `state` guards the memory cache and counters and is never held
//! across a remote call. A per-key claim makes sure only one thread at a time
//! validates or fetches a given key; other readers of that key wait for the
//! claim to be released and then re-evaluate, normally as a hit. `flush_lock`
//! orders disk writes so a newer snapshot is never overwritten by an older one.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::cache::{disk, CacheEntry, CacheKey, CacheStatistics, CacheStats, MemoryCache};
use crate::config::CacheSettings;
use crate::error::{AccessError, DiskCacheError, Result};
use crate::remote::{RemoteResource, Table};
use crate::retry::RetryHandler;

#[derive(Debug)]
struct CacheState {
    memory: MemoryCache,
    stats: CacheStats,
}

/// Releases a key claim and wakes waiting readers when dropped.
struct KeyClaim<'a> {
    in_flight: &'a Mutex<HashSet<CacheKey>>,
    released: &'a Condvar,
    key: CacheKey,
}

impl Drop for KeyClaim<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
        self.released.notify_all();
    }
}

// == Cache Service ==
pub struct CacheService<R> {
    remote: R,
    retry: Option<Arc<RetryHandler>>,
    settings: CacheSettings,
    state: Mutex<CacheState>,
    in_flight: Mutex<HashSet<CacheKey>>,
    released: Condvar,
    flush_lock: Mutex<()>,
}

impl<R: RemoteResource> CacheService<R> {
    // == Constructor ==
    /// Creates the service, warming the memory cache from disk when enabled.
    ///
    /// A missing, corrupt or foreign-version cache file starts the cache cold.
    pub fn new(remote: R, settings: CacheSettings) -> Self {
        let mut memory = MemoryCache::new(settings.max_size);

        if settings.enabled {
            for (key, entry) in disk::load(&settings.file_path, settings.max_size) {
                memory.insert(key, entry);
            }
            info!(
                "CacheService initialized (enabled=true, max_size={}, entries={})",
                settings.max_size,
                memory.len()
            );
        } else {
            info!("CacheService initialized (caching disabled)");
        }

        Self {
            remote,
            retry: None,
            settings,
            state: Mutex::new(CacheState {
                memory,
                stats: CacheStats::new(),
            }),
            in_flight: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            flush_lock: Mutex::new(()),
        }
    }

    /// Routes data fetches through `handler`.
    pub fn with_retry_handler(mut self, handler: Arc<RetryHandler>) -> Self {
        self.retry = Some(handler);
        self
    }

    // == Accessors ==
    /// Settings the service was built with.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Handler wrapping data fetches, if one was attached.
    pub fn retry_handler(&self) -> Option<&Arc<RetryHandler>> {
        self.retry.as_ref()
    }

    /// The wrapped remote resource.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    // == Read Cached ==
    /// Reads `query` from `resource_id`, serving from memory while the
    /// resource is unmodified.
    ///
    /// # Errors
    /// Failures of the data fetch itself propagate; failures while looking
    /// up the modification time or writing the disk cache are only logged.
    pub fn read_cached(&self, resource_id: &str, query: &str) -> Result<Table> {
        self.read(CacheKey::new(resource_id, query), true)
    }

    // == Batch Read Cached ==
    /// Reads every `(resource_id, query)` pair in order with a single disk
    /// flush at the end. The first failing read aborts the batch.
    pub fn batch_read_cached<S: AsRef<str>>(&self, requests: &[(S, S)]) -> Result<Vec<Table>> {
        let mut tables = Vec::with_capacity(requests.len());
        let outcome = requests.iter().try_for_each(|(resource_id, query)| {
            let key = CacheKey::new(resource_id.as_ref(), query.as_ref());
            tables.push(self.read(key, false)?);
            Ok::<_, AccessError>(())
        });

        if self.settings.enabled && self.settings.auto_save && !requests.is_empty() {
            self.auto_save();
        }

        outcome.map(|()| tables)
    }

    // == Invalidate Cache ==
    /// Drops cached entries and returns how many were dropped.
    ///
    /// - no arguments (or a query without a resource): everything
    /// - `resource_id` only: every query of that resource
    /// - both: exactly that entry
    pub fn invalidate_cache(&self, resource_id: Option<&str>, query: Option<&str>) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let removed = match (resource_id, query) {
                (Some(resource_id), Some(query)) => state
                    .memory
                    .remove(&CacheKey::new(resource_id, query))
                    .map_or(0, |_| 1),
                (Some(resource_id), None) => state.memory.remove_resource(resource_id),
                (None, _) => state.memory.clear(),
            };
            state.stats.record_invalidations(removed);
            removed
        };

        match (resource_id, query) {
            (Some(r), Some(q)) => info!("Invalidated {} cache entry for {}:{}", removed, r, q),
            (Some(r), None) => info!("Invalidated {} entries for resource {}", removed, r),
            (None, _) => info!("Invalidated entire cache ({} entries)", removed),
        }

        if self.settings.enabled && self.settings.auto_save {
            self.auto_save();
        }
        removed
    }

    // == Statistics ==
    /// Snapshot of cache counters, hit rate and current size.
    pub fn get_cache_statistics(&self) -> CacheStatistics {
        let state = self.state.lock();
        CacheStatistics::from_stats(
            &state.stats,
            self.settings.enabled,
            state.memory.len(),
            self.settings.max_size,
        )
    }

    // == Save ==
    /// Writes the memory cache to disk now, regardless of `auto_save`.
    pub fn save(&self) -> std::result::Result<(), DiskCacheError> {
        self.save_to_disk()
    }

    /// True if `(resource_id, query)` is held in memory. Does not validate
    /// freshness or change recency.
    pub fn contains(&self, resource_id: &str, query: &str) -> bool {
        self.state
            .lock()
            .memory
            .contains(&CacheKey::new(resource_id, query))
    }

    /// Number of entries held in memory.
    pub fn len(&self) -> usize {
        self.state.lock().memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().memory.is_empty()
    }

    // == Internals ==
    fn read(&self, key: CacheKey, flush: bool) -> Result<Table> {
        if !self.settings.enabled {
            let table = self.fetch(&key)?;
            self.state.lock().stats.record_passthrough();
            return Ok(table);
        }

        let _claim = self.claim(&key);

        let cached = self.state.lock().memory.contains(&key);
        if cached {
            let current = self.current_modified_at(&key);
            let mut state = self.state.lock();
            let fresh = state
                .memory
                .peek(&key)
                .map(|entry| current.is_some_and(|at| entry.is_fresh(at)));
            match fresh {
                Some(true) => {
                    if let Some(entry) = state.memory.get(&key) {
                        let payload = entry.payload.clone();
                        state.stats.record_hit();
                        debug!("Memory cache hit for {}", key);
                        return Ok(payload);
                    }
                }
                Some(false) => {
                    state.memory.remove(&key);
                    state.stats.record_invalidations(1);
                    debug!("Memory cache invalid (resource modified) for {}", key);
                }
                // Invalidated by another thread meanwhile.
                None => {}
            }
        }

        debug!("Cache miss for {}, fetching from remote", key);
        // Read the marker before the data: if the resource changes in between,
        // the entry is stored against the older time and invalidated next read.
        let marker = self.remote.modification_time(&key.resource_id);
        let table = self.fetch(&key)?;
        self.state.lock().stats.record_api_call();

        match marker {
            Ok(Some(modified_at)) => {
                let evicted = self
                    .state
                    .lock()
                    .memory
                    .insert(key, CacheEntry::new(table.clone(), modified_at));
                if !evicted.is_empty() {
                    debug!("Evicted {} entries to stay within max_size", evicted.len());
                }
                if flush && self.settings.auto_save {
                    self.auto_save();
                }
            }
            Ok(None) => {
                debug!("{} has no modification time, serving uncached", key);
            }
            Err(e) => {
                warn!("Failed to cache data for {}: {}", key, e);
            }
        }

        Ok(table)
    }

    fn fetch(&self, key: &CacheKey) -> Result<Table> {
        match &self.retry {
            Some(handler) => {
                handler.execute_with_retry(|| self.remote.fetch(&key.resource_id, &key.query))
            }
            None => Ok(self.remote.fetch(&key.resource_id, &key.query)?),
        }
    }

    /// Current modification time, or None when it cannot be established.
    fn current_modified_at(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        match self.remote.modification_time(&key.resource_id) {
            Ok(Some(at)) => Some(at),
            Ok(None) => {
                warn!("{} reports no modification time, dropping cached entry", key);
                None
            }
            Err(e) => {
                warn!("Failed to validate cache entry for {}: {}", key, e);
                None
            }
        }
    }

    fn claim(&self, key: &CacheKey) -> KeyClaim<'_> {
        let mut in_flight = self.in_flight.lock();
        while in_flight.contains(key) {
            self.released.wait(&mut in_flight);
        }
        in_flight.insert(key.clone());
        KeyClaim {
            in_flight: &self.in_flight,
            released: &self.released,
            key: key.clone(),
        }
    }

    fn auto_save(&self) {
        if let Err(e) = self.save_to_disk() {
            error!("Failed to save cache to disk: {}", e);
        }
    }

    fn save_to_disk(&self) -> std::result::Result<(), DiskCacheError> {
        let _flush = self.flush_lock.lock();

        let (bytes, count) = {
            let state = self.state.lock();
            (disk::encode(state.memory.iter_oldest_first())?, state.memory.len())
        };
        disk::write_atomic(&self.settings.file_path, &bytes)?;

        self.state.lock().stats.record_save();
        debug!("Saved {} entries to disk cache", count);
        Ok(())
    }
}
