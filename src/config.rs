//! Configuration Module
//!
//! Handles loading cache and retry settings from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryPolicy;

// == Cache Settings ==
/// Settings for the dual-layer cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// When false every read goes straight to the remote resource
    pub enabled: bool,
    /// Location of the on-disk cache file
    pub file_path: PathBuf,
    /// Maximum number of entries held in memory
    pub max_size: usize,
    /// Flush to disk after every mutation
    pub auto_save: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            file_path: PathBuf::from(".cache/sheets_cache.json"),
            max_size: 100,
            auto_save: true,
        }
    }
}

// == Config ==
/// Access layer configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub cache: CacheSettings,
    pub retry: RetryPolicy,
    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `ENABLE_SHEETS_CACHE` - Enable caching (default: true)
    /// - `CACHE_FILE_PATH` - Disk cache location (default: .cache/sheets_cache.json)
    /// - `CACHE_MAX_SIZE` - Maximum cached reads in memory (default: 100)
    /// - `CACHE_AUTO_SAVE` - Flush to disk after each change (default: true)
    /// - `MAX_RETRIES` - Retries after the first attempt (default: 3)
    /// - `RETRY_DELAY` - Base backoff in seconds (default: 1.0)
    /// - `RETRY_MAX_DELAY` - Backoff cap in seconds (default: 60)
    /// - `RETRY_EXPONENTIAL_BASE` - Backoff growth factor (default: 2.0)
    /// - `RETRY_JITTER_FACTOR` - Jitter fraction, clamped to 0..=1 (default: 0.1)
    /// - `CIRCUIT_BREAKER_THRESHOLD` - Failures before opening (default: 10)
    /// - `CIRCUIT_BREAKER_TIMEOUT` - Open duration in seconds (default: 60)
    /// - `LOG_LEVEL` - Default log level (default: info)
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let cache_defaults = CacheSettings::default();
        let retry_defaults = RetryPolicy::default();

        let cache = CacheSettings {
            enabled: flag(&lookup, "ENABLE_SHEETS_CACHE").unwrap_or(cache_defaults.enabled),
            file_path: lookup("CACHE_FILE_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(cache_defaults.file_path),
            max_size: parsed(&lookup, "CACHE_MAX_SIZE").unwrap_or(cache_defaults.max_size),
            auto_save: flag(&lookup, "CACHE_AUTO_SAVE").unwrap_or(cache_defaults.auto_save),
        };

        let retry = RetryPolicy {
            max_retries: parsed(&lookup, "MAX_RETRIES").unwrap_or(retry_defaults.max_retries),
            base_delay: seconds(&lookup, "RETRY_DELAY").unwrap_or(retry_defaults.base_delay),
            max_delay: seconds(&lookup, "RETRY_MAX_DELAY").unwrap_or(retry_defaults.max_delay),
            exponential_base: parsed::<f64>(&lookup, "RETRY_EXPONENTIAL_BASE")
                .filter(|b| b.is_finite() && *b >= 1.0)
                .unwrap_or(retry_defaults.exponential_base),
            jitter_factor: parsed::<f64>(&lookup, "RETRY_JITTER_FACTOR")
                .filter(|j| j.is_finite())
                .map(|j| j.clamp(0.0, 1.0))
                .unwrap_or(retry_defaults.jitter_factor),
            circuit_breaker_threshold: parsed(&lookup, "CIRCUIT_BREAKER_THRESHOLD")
                .unwrap_or(retry_defaults.circuit_breaker_threshold),
            circuit_breaker_timeout: seconds(&lookup, "CIRCUIT_BREAKER_TIMEOUT")
                .unwrap_or(retry_defaults.circuit_breaker_timeout),
        };

        let log_level = lookup("LOG_LEVEL")
            .map(|v| v.trim().to_lowercase())
            .filter(|v| matches!(v.as_str(), "trace" | "debug" | "info" | "warn" | "error"))
            .unwrap_or_else(|| "info".to_string());

        Self {
            cache,
            retry,
            log_level,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            retry: RetryPolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<bool> {
    match lookup(name)?.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<Duration> {
    parsed::<f64>(lookup, name)
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
}
