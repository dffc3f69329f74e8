//! Sheets Cache - resilient access layer for spreadsheet-backed billing
//!
//! Classifies remote failures, retries them with exponential backoff behind a
//! circuit breaker, and caches reads in memory and on disk, invalidated by the
//! remote resource's modification time.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod retry;

pub use cache::{CacheService, CacheStatistics};
pub use config::{CacheSettings, Config};
pub use error::{AccessError, RemoteError, Result, TransportKind};
pub use remote::{InMemoryRemote, RemoteResource, Table};
pub use retry::{CircuitStatus, ErrorClassifier, ErrorVerdict, RetryHandler, RetryPolicy, RetryStatistics};
