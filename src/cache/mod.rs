//! Cache Module
//!
//! Dual-layer cache for remote reads: a bounded LRU memory layer backed by a
//! versioned JSON file, invalidated by the resource's modification time.

pub mod disk;
mod entry;
mod lru;
mod service;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, CacheKey};
pub use lru::LruTracker;
pub use service::CacheService;
pub use stats::{CacheStatistics, CacheStats};
pub use store::MemoryCache;
