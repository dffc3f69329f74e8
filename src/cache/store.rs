//! Memory Cache Module
//!
//! HashMap storage combined with LRU tracking, bounded by `max_size`.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::{CacheEntry, CacheKey, LruTracker};

// == Memory Cache ==
/// Bounded in-memory layer of the cache.
///
/// Not synchronised on its own; `CacheService` keeps it behind its lock.
#[derive(Debug)]
pub struct MemoryCache {
    entries: HashMap<CacheKey, CacheEntry>,
    lru: LruTracker<CacheKey>,
    max_size: usize,
}

impl MemoryCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            max_size,
        }
    }

    /// Looks up an entry without changing its recency.
    pub fn peek(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Get ==
    /// Looks up an entry and marks it most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<&CacheEntry> {
        if self.entries.contains_key(key) {
            self.lru.touch(key);
        }
        self.entries.get(key)
    }

    // == Insert ==
    /// Stores an entry as most recently used, then evicts from the LRU end
    /// until the cache is back within `max_size`.
    ///
    /// Returns the evicted keys, oldest first.
    pub fn insert(&mut self, key: CacheKey, entry: CacheEntry) -> Vec<CacheKey> {
        self.lru.touch(&key);
        self.entries.insert(key, entry);

        let mut evicted = Vec::new();
        while self.entries.len() > self.max_size {
            let Some(oldest) = self.lru.evict_oldest() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!("Evicted cache entry (LRU): {}", oldest);
            evicted.push(oldest);
        }
        evicted
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.lru.remove(key);
        }
        removed
    }

    /// Removes every entry for `resource_id`. Returns how many were removed.
    pub fn remove_resource(&mut self, resource_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.resource_id != resource_id);
        self.lru.retain(|key| key.resource_id != resource_id);
        before - self.entries.len()
    }

    /// Drops everything. Returns how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        count
    }

    /// Entries from least to most recently used.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = (&CacheKey, &CacheEntry)> + '_ {
        self.lru
            .iter_oldest_first()
            .filter_map(|key| self.entries.get_key_value(key))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Table;
    use chrono::Utc;

    fn entry() -> CacheEntry {
        CacheEntry::new(Table::default(), Utc::now())
    }

    fn key(i: usize) -> CacheKey {
        CacheKey::new(format!("sheet-{i}"), "A1:D10")
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = MemoryCache::new(10);
        cache.insert(key(0), entry());

        assert!(cache.get(&key(0)).is_some());
        assert!(cache.get(&key(1)).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction_keeps_last_inserted() {
        let mut cache = MemoryCache::new(3);
        for i in 0..4 {
            cache.insert(key(i), entry());
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&key(0)));
        for i in 1..4 {
            assert!(cache.contains(&key(i)));
        }
    }

    #[test]
    fn test_get_protects_from_eviction() {
        let mut cache = MemoryCache::new(3);
        for i in 0..3 {
            cache.insert(key(i), entry());
        }

        cache.get(&key(0));
        let evicted = cache.insert(key(3), entry());

        assert_eq!(evicted, vec![key(1)]);
        assert!(cache.contains(&key(0)));
    }

    #[test]
    fn test_peek_does_not_touch() {
        let mut cache = MemoryCache::new(2);
        cache.insert(key(0), entry());
        cache.insert(key(1), entry());

        cache.peek(&key(0));
        let evicted = cache.insert(key(2), entry());
        assert_eq!(evicted, vec![key(0)]);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let mut cache = MemoryCache::new(3);
        cache.insert(key(0), entry());
        cache.insert(key(0), entry());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_resource() {
        let mut cache = MemoryCache::new(10);
        cache.insert(CacheKey::new("s1", "A"), entry());
        cache.insert(CacheKey::new("s1", "B"), entry());
        cache.insert(CacheKey::new("s2", "A"), entry());

        assert_eq!(cache.remove_resource("s1"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&CacheKey::new("s2", "A")));
        assert_eq!(cache.iter_oldest_first().count(), 1);
    }

    #[test]
    fn test_clear_returns_count() {
        let mut cache = MemoryCache::new(10);
        cache.insert(key(0), entry());
        cache.insert(key(1), entry());

        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.clear(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_nothing() {
        let mut cache = MemoryCache::new(0);
        let evicted = cache.insert(key(0), entry());
        assert_eq!(evicted, vec![key(0)]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_iter_oldest_first() {
        let mut cache = MemoryCache::new(10);
        for i in 0..3 {
            cache.insert(key(i), entry());
        }
        cache.get(&key(0));

        let order: Vec<_> = cache.iter_oldest_first().map(|(k, _)| k.clone()).collect();
        assert_eq!(order, vec![key(1), key(2), key(0)]);
    }
}
