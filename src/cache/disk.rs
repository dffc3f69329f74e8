//! Disk Cache Module
//!
//! Versioned JSON file backing the memory cache across restarts. Writes go
//! to a temp file in the target directory and are atomically renamed over the
//! target, so readers never see a partial file. Loading never fails: a
//! missing, corrupt or foreign-version file yields an empty cache.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheEntry, CacheKey};
use crate::error::DiskCacheError;

/// Version tag written to and expected from the cache file.
pub const CACHE_VERSION: &str = "1.0";

#[derive(Serialize)]
struct DiskCacheFile<'a> {
    version: &'a str,
    last_updated: DateTime<Utc>,
    entries: BTreeMap<String, &'a CacheEntry>,
}

// == Encode ==
/// Serializes entries into the on-disk format.
///
/// Keys are written as `<resource_id>:<query>` and split on the first colon
/// when loaded, so entries whose resource id contains a colon are skipped.
pub fn encode<'a>(
    entries: impl IntoIterator<Item = (&'a CacheKey, &'a CacheEntry)>,
) -> Result<Vec<u8>, serde_json::Error> {
    let file = DiskCacheFile {
        version: CACHE_VERSION,
        last_updated: Utc::now(),
        entries: entries
            .into_iter()
            .filter(|(key, _)| {
                let representable = !key.resource_id.contains(':');
                if !representable {
                    warn!("Not persisting {}: resource id contains ':'", key);
                }
                representable
            })
            .map(|(key, entry)| (key.to_string(), entry))
            .collect(),
    };
    serde_json::to_vec_pretty(&file)
}

// == Write Atomic ==
/// Replaces `path` with `bytes` via a sibling temp file and rename.
///
/// Parent directories are created as needed. On failure the temp file is
/// removed and `path` is left untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DiskCacheError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".sheets_cache")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;
    Ok(())
}

// == Load ==
/// Reads the cache file at `path`.
///
/// Returns entries ordered from oldest to newest `cached_at`. When the file
/// holds more than `max_size` entries only the `max_size` most recently
/// cached survive.
pub fn load(path: &Path, max_size: usize) -> Vec<(CacheKey, CacheEntry)> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Cache file not found: {}", path.display());
            return Vec::new();
        }
        Err(e) => {
            error!("Failed to read cache file {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let raw: Value = match serde_json::from_slice(&bytes) {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to parse cache file (corrupted JSON): {}", e);
            return Vec::new();
        }
    };

    let version = raw.get("version").and_then(Value::as_str).unwrap_or("unknown");
    if version != CACHE_VERSION {
        warn!(
            "Cache version mismatch (expected {}, got {}), ignoring disk cache",
            CACHE_VERSION, version
        );
        return Vec::new();
    }

    let Some(entries) = raw.get("entries").and_then(Value::as_object) else {
        warn!("Cache file has no entries map, ignoring disk cache");
        return Vec::new();
    };

    let mut loaded = Vec::with_capacity(entries.len());
    for (raw_key, raw_entry) in entries {
        let Some(key) = CacheKey::parse(raw_key) else {
            warn!("Invalid cache key format: {}", raw_key);
            continue;
        };
        match CacheEntry::deserialize(raw_entry) {
            Ok(entry) => loaded.push((key, entry)),
            Err(e) => warn!("Skipping unreadable cache entry {}: {}", raw_key, e),
        }
    }

    loaded.sort_by(|(ka, a), (kb, b)| a.cached_at.cmp(&b.cached_at).then_with(|| ka.cmp(kb)));
    if loaded.len() > max_size {
        let excess = loaded.len() - max_size;
        debug!("Dropping {} oldest disk cache entries over max_size", excess);
        loaded.drain(..excess);
    }

    info!("Loaded {} entries from disk cache", loaded.len());
    loaded
}
