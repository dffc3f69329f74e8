//! Circuit breaker state machine.
//!
//! Closed lets calls through. After `threshold` consecutive exhausted calls
//! the breaker opens and rejects calls until `timeout` has elapsed; the first
//! call after that is admitted as a half-open probe and decides whether the
//! breaker closes again or re-opens.

use std::time::{Duration, Instant};

use serde::Serialize;

// == Circuit Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

/// Outcome of asking the breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerDecision {
    /// Breaker closed; call normally
    Allow,
    /// Timeout elapsed; this call is the single half-open probe
    Probe,
    /// Breaker open (or a probe is in flight)
    Reject { retry_in: Duration },
}

// == Circuit Breaker ==
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    status: CircuitStatus,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    threshold: u32,
    timeout: Duration,
}

impl CircuitBreaker {
    /// A threshold of zero behaves like one.
    pub fn new(threshold: u32, timeout: Duration) -> Self {
        Self {
            status: CircuitStatus::Closed,
            consecutive_failures: 0,
            opened_at: None,
            threshold: threshold.max(1),
            timeout,
        }
    }

    pub fn status(&self) -> CircuitStatus {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    // == Admit ==
    /// Decides whether a call starting at `now` may proceed.
    ///
    /// An open breaker whose timeout has elapsed moves to half-open and
    /// admits exactly this caller; later callers are rejected until the
    /// probe reports back.
    pub fn admit(&mut self, now: Instant) -> BreakerDecision {
        match self.status {
            CircuitStatus::Closed => BreakerDecision::Allow,
            CircuitStatus::Open => {
                let elapsed = self
                    .opened_at
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or(self.timeout);
                if elapsed >= self.timeout {
                    self.status = CircuitStatus::HalfOpen;
                    BreakerDecision::Probe
                } else {
                    BreakerDecision::Reject {
                        retry_in: self.timeout - elapsed,
                    }
                }
            }
            CircuitStatus::HalfOpen => BreakerDecision::Reject {
                retry_in: Duration::ZERO,
            },
        }
    }

    // == Record Success ==
    /// Resets the failure count. Returns true if this closed the breaker.
    pub fn record_success(&mut self) -> bool {
        self.consecutive_failures = 0;
        if self.status != CircuitStatus::Closed {
            self.status = CircuitStatus::Closed;
            self.opened_at = None;
            return true;
        }
        false
    }

    // == Record Failure ==
    /// Counts an exhausted call. Returns true if this opened the breaker.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        match self.status {
            CircuitStatus::Closed if self.consecutive_failures >= self.threshold => {
                self.open(now);
                true
            }
            CircuitStatus::HalfOpen => {
                self.open(now);
                true
            }
            _ => false,
        }
    }

    /// Ends a probe that failed for a non-retryable reason.
    ///
    /// Returns to open with the original `opened_at`, so the next caller
    /// may probe immediately.
    pub fn abandon_probe(&mut self) {
        if self.status == CircuitStatus::HalfOpen {
            self.status = CircuitStatus::Open;
        }
    }

    pub fn reset(&mut self) {
        self.status = CircuitStatus::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    fn open(&mut self, now: Instant) {
        self.status = CircuitStatus::Open;
        self.opened_at = Some(now);
    }
}
