//! Classify remote failures into retryable, fatal or unknown.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::RemoteError;

// == Error Verdict ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorVerdict {
    /// Rate limit, server error or transport failure
    Retryable,
    /// Client error other than 429
    Fatal,
    /// Not classified; never retried
    Unknown,
}

impl ErrorVerdict {
    /// Lowercase tag used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorVerdict::Retryable => "retryable",
            ErrorVerdict::Fatal => "fatal",
            ErrorVerdict::Unknown => "unknown",
        }
    }

    /// Capitalised name for operator-facing output.
    pub fn name(self) -> &'static str {
        match self {
            ErrorVerdict::Retryable => "Retryable",
            ErrorVerdict::Fatal => "Fatal",
            ErrorVerdict::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure verdict for a failure, without touching any counters.
pub(crate) fn verdict_for(error: &RemoteError) -> ErrorVerdict {
    match error {
        RemoteError::Status { code: 429, .. } => ErrorVerdict::Retryable,
        RemoteError::Status { code: 500..=599, .. } => ErrorVerdict::Retryable,
        RemoteError::Status { code: 400..=499, .. } => ErrorVerdict::Fatal,
        RemoteError::Status { .. } => ErrorVerdict::Unknown,
        RemoteError::Transport { .. } => ErrorVerdict::Retryable,
        RemoteError::Other(_) => ErrorVerdict::Unknown,
    }
}

// == Classifier Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifierStats {
    pub retryable: u64,
    pub fatal: u64,
    pub unknown: u64,
    pub total: u64,
}

impl ClassifierStats {
    fn record(&mut self, verdict: ErrorVerdict) {
        self.total += 1;
        match verdict {
            ErrorVerdict::Retryable => self.retryable += 1,
            ErrorVerdict::Fatal => self.fatal += 1,
            ErrorVerdict::Unknown => self.unknown += 1,
        }
    }
}

// == Error Classifier ==
/// Classifies failures and keeps running counts of each verdict.
#[derive(Debug, Default)]
pub struct ErrorClassifier {
    stats: Mutex<ClassifierStats>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `error` and records the verdict.
    pub fn classify(&self, error: &RemoteError) -> ErrorVerdict {
        let verdict = verdict_for(error);
        self.stats.lock().record(verdict);
        verdict
    }

    pub fn is_retryable(&self, error: &RemoteError) -> bool {
        self.classify(error) == ErrorVerdict::Retryable
    }

    pub fn classify_batch(&self, errors: &[RemoteError]) -> Vec<ErrorVerdict> {
        errors.iter().map(|e| self.classify(e)).collect()
    }

    /// Human-readable summary including the verdict, for logging.
    pub fn describe(&self, error: &RemoteError) -> String {
        let verdict = self.classify(error);
        match error {
            RemoteError::Status { code: 429, .. } => {
                format!("Rate limit error (HTTP 429) - {verdict}")
            }
            RemoteError::Status { code: code @ 500..=599, .. } => {
                format!("Server error (HTTP {code}) - {verdict}")
            }
            RemoteError::Status { code: code @ 400..=499, .. } => {
                format!("Client error (HTTP {code}) - {verdict}")
            }
            RemoteError::Transport { kind, .. } if kind.is_timeout() => {
                format!("Network timeout error - {verdict}")
            }
            RemoteError::Transport { .. } => format!("Network connection error - {verdict}"),
            other => format!("{other} - {verdict}"),
        }
    }

    pub fn get_statistics(&self) -> ClassifierStats {
        self.stats.lock().clone()
    }

    pub fn reset_statistics(&self) {
        *self.stats.lock() = ClassifierStats::default();
    }
}
