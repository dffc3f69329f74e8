//! Error types for the access layer
//!
//! Provides the remote failure taxonomy and the errors surfaced by the
//! retry and cache layers, using thiserror.

use std::time::Duration;

use thiserror::Error;

// == Transport Kind ==
/// Network-level failure shapes a remote collaborator can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The remote end refused the connection
    ConnectionRefused,
    /// The connection dropped mid-request
    ConnectionReset,
    /// Host name could not be resolved
    Dns,
    /// Connect or read timed out
    Timeout,
}

impl TransportKind {
    /// Returns true for timeouts, false for connection-level failures.
    pub fn is_timeout(self) -> bool {
        matches!(self, TransportKind::Timeout)
    }
}

// == Remote Error ==
/// Failure reported by a remote resource call.
///
/// Collaborators implementing [`crate::remote::RemoteResource`] map their
/// native errors into one of these shapes so they can be classified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Status-coded response (HTTP-style)
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    /// Transport-level failure
    #[error("transport error ({kind:?}): {message}")]
    Transport { kind: TransportKind, message: String },

    /// Anything the collaborator could not place in the shapes above
    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    /// Builds a status-coded failure.
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        RemoteError::Status {
            code,
            message: message.into(),
        }
    }

    /// Builds a transport failure.
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        RemoteError::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Returns the status code for status-coded failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

// == Access Error ==
/// Error returned by retry-wrapped and cached reads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Every attempt failed with a retryable error
    #[error("Max retries exceeded after {attempts} attempts. Last error: {source}")]
    RetryExhausted { attempts: u32, source: RemoteError },

    /// Circuit breaker is open; the operation was not attempted
    #[error("Circuit breaker is open (retry in {retry_in:?})")]
    CircuitOpen { retry_in: Duration },

    /// Non-retryable failure, propagated unchanged
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl AccessError {
    /// Returns the underlying remote failure, if there is one.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            AccessError::RetryExhausted { source, .. } => Some(source),
            AccessError::Remote(err) => Some(err),
            AccessError::CircuitOpen { .. } => None,
        }
    }

    /// True when the breaker rejected the call without attempting it.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, AccessError::CircuitOpen { .. })
    }
}

// == Disk Cache Error ==
/// Failure while flushing the cache to disk. Logged, never surfaced to readers.
#[derive(Error, Debug)]
pub enum DiskCacheError {
    #[error("cache file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file serialization: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cache file replace: {0}")]
    Persist(#[from] tempfile::PersistError),
}

// == Result Type Alias ==
/// Convenience Result type for the access layer.
pub type Result<T> = std::result::Result<T, AccessError>;
