//! Cache Entry Module
//!
//! Defines cache keys and the entries stored against them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::Table;

// == Cache Key ==
/// Identifies a cached read: a resource and a query (range) within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub resource_id: String,
    pub query: String,
}

impl CacheKey {
    pub fn new(resource_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            query: query.into(),
        }
    }

    /// Parses the `"<resource_id>:<query>"` form used in the disk file.
    ///
    /// Splits on the first colon; queries such as `Sheet1!A1:D10` keep theirs.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.split_once(':')
            .map(|(resource_id, query)| Self::new(resource_id, query))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_id, self.query)
    }
}

// == Cache Entry ==
/// Snapshot of a remote read plus the freshness marker it was cached against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached table
    #[serde(rename = "data")]
    pub payload: Table,
    /// Resource modification time observed when the entry was cached
    #[serde(rename = "modified_time")]
    pub resource_modified_at: DateTime<Utc>,
    /// When the entry was cached
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry cached now.
    pub fn new(payload: Table, resource_modified_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            resource_modified_at,
            cached_at: Utc::now(),
        }
    }

    // == Is Fresh ==
    /// Checks the entry against the resource's current modification time.
    ///
    /// Boundary condition: an unchanged timestamp (equal) is still fresh;
    /// only a strictly later modification invalidates the entry.
    pub fn is_fresh(&self, current_modified_at: DateTime<Utc>) -> bool {
        current_modified_at <= self.resource_modified_at
    }
}
