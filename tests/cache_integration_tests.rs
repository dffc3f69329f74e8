//! Integration Tests for the Access Layer
//!
//! Drives the public API end to end: cached reads over a scripted remote,
//! disk persistence across service instances, and retry/breaker behavior.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use sheets_cache::cache::disk::CACHE_VERSION;
use sheets_cache::{
    AccessError, CacheService, CacheSettings, CircuitStatus, InMemoryRemote, RemoteError,
    RetryHandler, RetryPolicy, Table, TransportKind,
};

// == Helper Functions ==

fn timesheet() -> Table {
    Table::from_rows(
        &["consultant", "hours"],
        vec![vec![json!("J. Martin"), json!(7.5)], vec![json!("S. Okafor"), json!(6)]],
    )
}

fn seeded_remote(resources: &[&str], query: &str) -> Arc<InMemoryRemote> {
    let remote = Arc::new(InMemoryRemote::new());
    let modified = Utc.with_ymd_and_hms(2025, 10, 5, 10, 0, 0).unwrap();
    for r in resources {
        remote.insert_table(r, query, timesheet());
        remote.set_modified_time(r, modified);
    }
    remote
}

fn settings_at(path: &Path) -> CacheSettings {
    CacheSettings {
        enabled: true,
        file_path: path.to_path_buf(),
        max_size: 100,
        auto_save: true,
    }
}

fn fast_policy(max_retries: u32, threshold: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        circuit_breaker_threshold: threshold,
        circuit_breaker_timeout: Duration::from_millis(50),
        ..RetryPolicy::default()
    }
}

// == Cached Reads ==

#[test]
fn test_hit_miss_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let remote = seeded_remote(&["s1"], "R1");
    let cache = CacheService::new(Arc::clone(&remote), settings_at(&dir.path().join("c.json")));

    cache.read_cached("s1", "R1").unwrap();
    cache.read_cached("s1", "R1").unwrap();

    let stats = cache.get_cache_statistics();
    assert_eq!(stats.api_calls, 1);
    assert_eq!(stats.memory_hits, 1);
    assert_eq!(stats.memory_hit_rate_pct, 50.0);
    assert_eq!(stats.api_calls_saved, 1);
}

#[test]
fn test_modified_resource_is_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let remote = seeded_remote(&["s1"], "R1");
    let cache = CacheService::new(Arc::clone(&remote), settings_at(&dir.path().join("c.json")));

    cache.read_cached("s1", "R1").unwrap();
    let updated = Table::from_rows(&["consultant", "hours"], vec![vec![json!("J. Martin"), json!(8)]]);
    remote.insert_table("s1", "R1", updated.clone());
    remote.touch("s1", chrono::Duration::minutes(10));

    assert_eq!(cache.read_cached("s1", "R1").unwrap(), updated);
    let stats = cache.get_cache_statistics();
    assert_eq!(stats.api_calls, 2);
    assert_eq!(stats.cache_invalidations, 1);
}

#[test]
fn test_batch_read_dedups_repeated_keys() {
    let dir = tempfile::tempdir().unwrap();
    let remote = seeded_remote(&["s1", "s2"], "R");
    let cache = CacheService::new(Arc::clone(&remote), settings_at(&dir.path().join("c.json")));

    let tables = cache
        .batch_read_cached(&[("s1", "R"), ("s2", "R"), ("s1", "R")])
        .unwrap();

    assert_eq!(tables, vec![timesheet(), timesheet(), timesheet()]);
    let stats = cache.get_cache_statistics();
    assert_eq!(stats.api_calls, 2);
    assert_eq!(stats.memory_hits, 1);
}

#[test]
fn test_empty_batch_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.json");
    let cache = CacheService::new(seeded_remote(&[], "R"), settings_at(&path));

    let requests: [(&str, &str); 0] = [];
    assert!(cache.batch_read_cached(&requests).unwrap().is_empty());
    assert!(!path.exists());
}

#[test]
fn test_batch_stops_at_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let remote = seeded_remote(&["s1"], "R");
    let cache = CacheService::new(Arc::clone(&remote), settings_at(&dir.path().join("c.json")));

    let err = cache
        .batch_read_cached(&[("s1", "R"), ("missing", "R"), ("s1", "R")])
        .unwrap_err();

    assert_eq!(err.remote().and_then(RemoteError::status_code), Some(404));
    assert_eq!(cache.get_cache_statistics().memory_hits, 0);
    assert!(cache.contains("s1", "R"));
}

#[test]
fn test_max_size_keeps_most_recent_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let sheets = ["sheet-0", "sheet-1", "sheet-2", "sheet-3"];
    let remote = seeded_remote(&sheets, "R");
    let cache = CacheService::new(
        Arc::clone(&remote),
        CacheSettings {
            max_size: 3,
            ..settings_at(&dir.path().join("c.json"))
        },
    );

    for s in sheets {
        cache.read_cached(s, "R").unwrap();
    }

    assert_eq!(cache.len(), 3);
    assert!(!cache.contains("sheet-0", "R"));
    for s in &sheets[1..] {
        assert!(cache.contains(s, "R"));
    }
}

#[test]
fn test_invalidation_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let remote = seeded_remote(&["s1", "s2"], "R");
    let cache = CacheService::new(Arc::clone(&remote), settings_at(&dir.path().join("c.json")));
    cache.read_cached("s1", "R").unwrap();
    cache.read_cached("s2", "R").unwrap();

    assert_eq!(cache.invalidate_cache(Some("s1"), None), 1);
    assert_eq!(cache.invalidate_cache(Some("s1"), None), 0);
    assert_eq!(cache.invalidate_cache(None, None), 1);
    assert_eq!(cache.invalidate_cache(None, None), 0);
    assert!(cache.is_empty());
}

// == Disk Persistence ==

#[test]
fn test_disk_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".cache").join("sheets_cache.json");
    let remote = seeded_remote(&["s1"], "Sheet1!A1:D10");

    {
        let cache = CacheService::new(Arc::clone(&remote), settings_at(&path));
        cache.read_cached("s1", "Sheet1!A1:D10").unwrap();
    }
    assert_eq!(remote.fetch_calls(), 1);

    let restarted = CacheService::new(Arc::clone(&remote), settings_at(&path));
    assert_eq!(restarted.len(), 1);
    assert_eq!(restarted.read_cached("s1", "Sheet1!A1:D10").unwrap(), timesheet());

    assert_eq!(remote.fetch_calls(), 1);
    assert_eq!(restarted.get_cache_statistics().memory_hits, 1);
}

#[test]
fn test_disk_file_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.json");
    let cache = CacheService::new(seeded_remote(&["s1"], "R1"), settings_at(&path));
    cache.read_cached("s1", "R1").unwrap();

    let json: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(json["version"], CACHE_VERSION);
    let entry = &json["entries"]["s1:R1"];
    assert_eq!(entry["data"][0]["consultant"], "J. Martin");
    assert!(entry["modified_time"].is_string());
    assert!(entry["cached_at"].is_string());
}

#[test]
fn test_corrupted_disk_cache_starts_cold() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.json");
    fs::write(&path, "{\"version\": \"1.0\", \"entries\": ").unwrap();
    let remote = seeded_remote(&["s1"], "R1");

    let cache = CacheService::new(Arc::clone(&remote), settings_at(&path));
    assert!(cache.is_empty());
    cache.read_cached("s1", "R1").unwrap();
    assert_eq!(remote.fetch_calls(), 1);
}

#[test]
fn test_version_mismatch_starts_cold() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c.json");
    let remote = seeded_remote(&["s1"], "R1");
    CacheService::new(Arc::clone(&remote), settings_at(&path))
        .read_cached("s1", "R1")
        .unwrap();

    let mut json: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    json["version"] = json!("2.0");
    fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

    assert!(CacheService::new(Arc::clone(&remote), settings_at(&path)).is_empty());
}

// == Retry and Circuit Breaker ==

#[test]
fn test_transient_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let remote = seeded_remote(&["s1"], "R1");
    remote.fail_next_fetches([
        RemoteError::status(503, "Service Unavailable"),
        RemoteError::transport(TransportKind::ConnectionReset, "reset by peer"),
    ]);
    let retry = Arc::new(RetryHandler::new(fast_policy(3, 5)));
    let cache = CacheService::new(Arc::clone(&remote), settings_at(&dir.path().join("c.json")))
        .with_retry_handler(Arc::clone(&retry));

    assert_eq!(cache.read_cached("s1", "R1").unwrap(), timesheet());

    let stats = retry.get_retry_statistics();
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.total_retries, 2);
    assert_eq!(stats.total_failures, 0);
    assert_eq!(cache.get_cache_statistics().api_calls, 1);
}

#[test]
fn test_fatal_failure_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let remote = seeded_remote(&["s1"], "R1");
    remote.fail_next_fetches([RemoteError::status(404, "Not Found")]);
    let retry = Arc::new(RetryHandler::new(fast_policy(3, 5)));
    let cache = CacheService::new(Arc::clone(&remote), settings_at(&dir.path().join("c.json")))
        .with_retry_handler(Arc::clone(&retry));

    let err = cache.read_cached("s1", "R1").unwrap_err();
    assert_eq!(err, AccessError::Remote(RemoteError::status(404, "Not Found")));
    assert_eq!(remote.fetch_calls(), 1);
}

#[test]
fn test_breaker_opens_and_recovers() {
    let remote = seeded_remote(&["s1"], "R1");
    let retry = RetryHandler::new(fast_policy(0, 2));
    let failing = || Err::<Table, _>(RemoteError::status(500, "boom"));

    for _ in 0..2 {
        let err = retry.execute_with_retry(failing).unwrap_err();
        assert!(matches!(err, AccessError::RetryExhausted { attempts: 1, .. }));
    }
    assert_eq!(retry.circuit_status(), CircuitStatus::Open);

    let mut calls = 0;
    let rejected = retry.execute_with_retry(|| {
        calls += 1;
        Ok::<_, RemoteError>(())
    });
    assert!(rejected.unwrap_err().is_circuit_open());
    assert_eq!(calls, 0);

    std::thread::sleep(Duration::from_millis(80));
    let table = retry
        .execute_with_retry(|| sheets_cache::RemoteResource::fetch(&remote, "s1", "R1"))
        .unwrap();
    assert_eq!(table, timesheet());
    assert_eq!(retry.circuit_status(), CircuitStatus::Closed);
    assert_eq!(retry.get_retry_statistics().failure_count, 0);
}

#[test]
fn test_manual_breaker_reset() {
    let retry = RetryHandler::new(fast_policy(0, 1));
    let _ = retry.execute_with_retry(|| Err::<(), _>(RemoteError::status(502, "Bad Gateway")));
    assert!(retry.get_retry_statistics().circuit_breaker_open);

    retry.reset_circuit_breaker();

    assert_eq!(retry.circuit_status(), CircuitStatus::Closed);
    assert!(retry.execute_with_retry(|| Ok::<_, RemoteError>(1)).is_ok());
}
