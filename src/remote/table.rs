//! Tabular payload returned by remote reads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of a sheet, keyed by column header.
pub type Record = Map<String, Value>;

// == Table ==
/// Snapshot of a sheet range in records orientation.
///
/// Serializes as a plain JSON array of objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Record>,
}

impl Table {
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    /// Builds a table from a header row and value rows.
    ///
    /// Short rows leave their trailing columns absent; extra cells are dropped.
    pub fn from_rows<H, R>(headers: &[H], rows: impl IntoIterator<Item = R>) -> Self
    where
        H: AsRef<str>,
        R: IntoIterator<Item = Value>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                headers
                    .iter()
                    .zip(row)
                    .map(|(h, v)| (h.as_ref().to_string(), v))
                    .collect::<Record>()
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }
}
