//! Sheets Cache demo
//!
//! Exercises the access layer against an in-process timesheet resource:
//! cold, warm and post-modification reads, a batch read with a transient
//! failure, then the cache and retry statistics.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use tracing::info;

use sheets_cache::{
    logging, CacheService, Config, InMemoryRemote, RemoteError, RetryHandler, Table,
};

const TIMESHEET: &str = "timesheet-2025-10";
const RATES: &str = "rates";
const HOURS_RANGE: &str = "Hours!A1:E100";
const RATES_RANGE: &str = "Rates!A1:C20";

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Load configuration from environment variables
/// 2. Initialize tracing subscriber for logging
/// 3. Seed the in-process remote resource
/// 4. Build the retry handler and cache service
/// 5. Run the read scenarios and report statistics
fn main() -> Result<()> {
    let config = Config::from_env();
    logging::init(&logging::directive_for(&config.log_level));

    info!("Starting sheets_cache demo");
    info!(
        "Configuration loaded: cache_enabled={}, cache_file={}, max_size={}, max_retries={}",
        config.cache.enabled,
        config.cache.file_path.display(),
        config.cache.max_size,
        config.retry.max_retries
    );

    let remote = Arc::new(seed_remote());
    let retry = Arc::new(RetryHandler::new(config.retry));
    let cache = CacheService::new(Arc::clone(&remote), config.cache.clone())
        .with_retry_handler(Arc::clone(&retry));

    // Cold read, then the same read again from memory
    let hours = cache.read_cached(TIMESHEET, HOURS_RANGE)?;
    info!("Cold read returned {} rows", hours.len());
    let hours = cache.read_cached(TIMESHEET, HOURS_RANGE)?;
    info!("Warm read returned {} rows", hours.len());

    // A consultant edits the timesheet; the next read refetches
    remote.touch(TIMESHEET, Duration::minutes(5));
    let hours = cache.read_cached(TIMESHEET, HOURS_RANGE)?;
    info!("Read after modification returned {} rows", hours.len());

    // Batch with a transient backend failure on the first fetch
    remote.fail_next_fetches([RemoteError::status(503, "Service Unavailable")]);
    let tables = cache.batch_read_cached(&[
        (RATES, RATES_RANGE),
        (TIMESHEET, HOURS_RANGE),
        (RATES, RATES_RANGE),
    ])?;
    info!("Batch read returned {} tables", tables.len());

    info!(
        "Cache statistics: {}",
        serde_json::to_string_pretty(&cache.get_cache_statistics())?
    );
    info!(
        "Retry statistics: {}",
        serde_json::to_string_pretty(&retry.get_retry_statistics())?
    );
    info!(
        "Remote calls: fetch={}, modification_time={}",
        remote.fetch_calls(),
        remote.modification_time_calls()
    );

    Ok(())
}

fn seed_remote() -> InMemoryRemote {
    let remote = InMemoryRemote::new();
    let last_edit = Utc
        .with_ymd_and_hms(2025, 10, 5, 9, 30, 0)
        .single()
        .unwrap_or_else(Utc::now);

    remote.insert_table(
        TIMESHEET,
        HOURS_RANGE,
        Table::from_rows(
            &["date", "consultant", "client", "project", "hours"],
            vec![
                vec![json!("2025-10-01"), json!("J. Martin"), json!("Acme"), json!("Migration"), json!(7.5)],
                vec![json!("2025-10-02"), json!("J. Martin"), json!("Acme"), json!("Migration"), json!(8)],
                vec![json!("2025-10-02"), json!("S. Okafor"), json!("Globex"), json!("Audit"), json!(6)],
            ],
        ),
    );
    remote.insert_table(
        RATES,
        RATES_RANGE,
        Table::from_rows(
            &["consultant", "client", "daily_rate"],
            vec![
                vec![json!("J. Martin"), json!("Acme"), json!(650)],
                vec![json!("S. Okafor"), json!("Globex"), json!(720)],
            ],
        ),
    );
    remote.set_modified_time(TIMESHEET, last_edit);
    remote.set_modified_time(RATES, last_edit);
    remote
}
