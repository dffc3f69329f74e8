//! Remote Resource Module
//!
//! The contract the access layer requires from the spreadsheet/file service,
//! and the tabular payload it returns.

mod memory;
mod table;

pub use memory::InMemoryRemote;
pub use table::{Record, Table};

use chrono::{DateTime, Utc};

use crate::error::RemoteError;

// == Remote Resource ==
/// A remote tabular data source with a modification-time oracle.
///
/// Implemented by the business layer on top of the real spreadsheet API.
/// Calls block; any timeout must be imposed by the implementation itself.
pub trait RemoteResource: Send + Sync {
    /// Reads `query` (e.g. a sheet range) from the resource.
    fn fetch(&self, resource_id: &str, query: &str) -> Result<Table, RemoteError>;

    /// Returns the resource's last-modified time.
    ///
    /// `Ok(None)` means the resource exposes no modification time; data read
    /// from it is served but never cached.
    fn modification_time(&self, resource_id: &str) -> Result<Option<DateTime<Utc>>, RemoteError>;
}

impl<R: RemoteResource + ?Sized> RemoteResource for std::sync::Arc<R> {
    fn fetch(&self, resource_id: &str, query: &str) -> Result<Table, RemoteError> {
        (**self).fetch(resource_id, query)
    }

    fn modification_time(&self, resource_id: &str) -> Result<Option<DateTime<Utc>>, RemoteError> {
        (**self).modification_time(resource_id)
    }
}
