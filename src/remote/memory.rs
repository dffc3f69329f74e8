//! In-process remote resource
//!
//! Scriptable stand-in for the spreadsheet service: holds tables and
//! modification times in memory, can be told to fail upcoming calls, and
//! counts how often it was asked.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::RemoteError;
use crate::remote::{RemoteResource, Table};

#[derive(Debug, Default)]
struct RemoteState {
    tables: HashMap<(String, String), Table>,
    modified: HashMap<String, DateTime<Utc>>,
    fetch_failures: VecDeque<RemoteError>,
    modification_failures: VecDeque<RemoteError>,
    fetch_calls: u64,
    modification_calls: u64,
}

// == In-Memory Remote ==
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    state: Mutex<RemoteState>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `table` under `(resource_id, query)`, replacing any previous one.
    pub fn insert_table(&self, resource_id: &str, query: &str, table: Table) {
        self.state
            .lock()
            .tables
            .insert((resource_id.to_string(), query.to_string()), table);
    }

    pub fn set_modified_time(&self, resource_id: &str, at: DateTime<Utc>) {
        self.state.lock().modified.insert(resource_id.to_string(), at);
    }

    /// Makes the resource report no modification time.
    pub fn clear_modified_time(&self, resource_id: &str) {
        self.state.lock().modified.remove(resource_id);
    }

    /// Advances the resource's modification time by `by`.
    ///
    /// A resource with no modification time starts from now.
    pub fn touch(&self, resource_id: &str, by: Duration) {
        let mut state = self.state.lock();
        let current = state
            .modified
            .get(resource_id)
            .copied()
            .unwrap_or_else(Utc::now);
        state.modified.insert(resource_id.to_string(), current + by);
    }

    /// Queues failures returned by the next `fetch` calls, in order.
    pub fn fail_next_fetches(&self, errors: impl IntoIterator<Item = RemoteError>) {
        self.state.lock().fetch_failures.extend(errors);
    }

    /// Queues a failure for the next modification-time lookup.
    pub fn fail_next_modification_time(&self, error: RemoteError) {
        self.state.lock().modification_failures.push_back(error);
    }

    pub fn fetch_calls(&self) -> u64 {
        self.state.lock().fetch_calls
    }

    pub fn modification_time_calls(&self) -> u64 {
        self.state.lock().modification_calls
    }
}

impl RemoteResource for InMemoryRemote {
    fn fetch(&self, resource_id: &str, query: &str) -> Result<Table, RemoteError> {
        let mut state = self.state.lock();
        state.fetch_calls += 1;

        if let Some(err) = state.fetch_failures.pop_front() {
            return Err(err);
        }

        state
            .tables
            .get(&(resource_id.to_string(), query.to_string()))
            .cloned()
            .ok_or_else(|| RemoteError::status(404, format!("{resource_id}:{query} not found")))
    }

    fn modification_time(&self, resource_id: &str) -> Result<Option<DateTime<Utc>>, RemoteError> {
        let mut state = self.state.lock();
        state.modification_calls += 1;

        if let Some(err) = state.modification_failures.pop_front() {
            return Err(err);
        }

        Ok(state.modified.get(resource_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportKind;
    use serde_json::json;

    fn sample() -> Table {
        Table::from_rows(&["A"], vec![vec![json!(1)]])
    }

    #[test]
    fn test_fetch_known_table() {
        let remote = InMemoryRemote::new();
        remote.insert_table("s1", "R1", sample());

        assert_eq!(remote.fetch("s1", "R1").unwrap(), sample());
        assert_eq!(remote.fetch_calls(), 1);
    }

    #[test]
    fn test_fetch_unknown_table_is_404() {
        let remote = InMemoryRemote::new();
        let err = remote.fetch("s1", "missing").unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn test_queued_failures_are_consumed_in_order() {
        let remote = InMemoryRemote::new();
        remote.insert_table("s1", "R1", sample());
        remote.fail_next_fetches([
            RemoteError::status(503, "unavailable"),
            RemoteError::transport(TransportKind::Timeout, "slow"),
        ]);

        assert_eq!(remote.fetch("s1", "R1").unwrap_err().status_code(), Some(503));
        assert!(matches!(
            remote.fetch("s1", "R1").unwrap_err(),
            RemoteError::Transport { .. }
        ));
        assert!(remote.fetch("s1", "R1").is_ok());
        assert_eq!(remote.fetch_calls(), 3);
    }

    #[test]
    fn test_touch_advances_modification_time() {
        let remote = InMemoryRemote::new();
        let base = Utc::now();
        remote.set_modified_time("s1", base);
        remote.touch("s1", Duration::hours(1));

        assert_eq!(
            remote.modification_time("s1").unwrap(),
            Some(base + Duration::hours(1))
        );
    }

    #[test]
    fn test_missing_modification_time_is_none() {
        let remote = InMemoryRemote::new();
        assert_eq!(remote.modification_time("s1").unwrap(), None);
        assert_eq!(remote.modification_time_calls(), 1);
    }
}
