//! Retry handler: backoff loop plus circuit breaker.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AccessError, RemoteError, Result};
use crate::retry::breaker::{BreakerDecision, CircuitBreaker, CircuitStatus};
use crate::retry::classify::{ErrorClassifier, ErrorVerdict};
use crate::retry::policy::RetryPolicy;

type RetryCondition = dyn Fn(&RemoteError) -> bool + Send + Sync;
type Sleeper = dyn Fn(Duration) + Send + Sync;

// == Retry Statistics ==
/// Snapshot of handler counters and breaker state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryStatistics {
    pub total_calls: u64,
    pub total_retries: u64,
    pub total_failures: u64,
    pub circuit_status: CircuitStatus,
    pub circuit_breaker_open: bool,
    pub failure_count: u32,
}

#[derive(Debug)]
struct HandlerState {
    breaker: CircuitBreaker,
    total_calls: u64,
    total_retries: u64,
    total_failures: u64,
}

/// Returns an unresolved half-open probe to open when dropped armed,
/// e.g. when the operation panics mid-probe.
struct ProbeGuard<'a> {
    state: &'a Mutex<HandlerState>,
    armed: bool,
}

impl ProbeGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.lock().breaker.abandon_probe();
            warn!("Circuit breaker probe did not complete, breaker left open");
        }
    }
}

// == Retry Handler ==
/// Runs remote operations with exponential backoff and a circuit breaker.
///
/// Shared between threads via `Arc`; breaker state and counters sit behind
/// one lock that is never held while the operation runs or while sleeping.
pub struct RetryHandler {
    policy: RetryPolicy,
    classifier: ErrorClassifier,
    retry_condition: Option<Box<RetryCondition>>,
    sleeper: Box<Sleeper>,
    state: Mutex<HandlerState>,
}

impl fmt::Debug for RetryHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandler")
            .field("policy", &self.policy)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for RetryHandler {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryHandler {
    // == Constructor ==
    /// Creates a handler with a closed breaker and zeroed counters.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            classifier: ErrorClassifier::new(),
            retry_condition: None,
            sleeper: Box::new(std::thread::sleep),
            state: Mutex::new(HandlerState {
                breaker: CircuitBreaker::new(
                    policy.circuit_breaker_threshold,
                    policy.circuit_breaker_timeout,
                ),
                total_calls: 0,
                total_retries: 0,
                total_failures: 0,
            }),
            policy,
        }
    }

    /// Replaces the classifier's retry decision with a custom predicate.
    pub fn with_retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&RemoteError) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Some(Box::new(condition));
        self
    }

    /// Replaces the blocking sleep used between attempts.
    pub fn with_sleeper<F>(mut self, sleeper: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// The backoff and breaker settings this handler was built with.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Classifier consulted on every failure; its counters cover all attempts.
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    // == Execute With Retry ==
    /// Runs `operation` until it succeeds, fails fatally, or runs out of retries.
    ///
    /// # Errors
    /// - `CircuitOpen` if the breaker rejected the call; `operation` was not run
    /// - `RetryExhausted` wrapping the last failure after `max_retries` retries
    /// - `Remote` with the original failure if it was not retryable
    pub fn execute_with_retry<T, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, RemoteError>,
    {
        let decision = {
            let mut state = self.state.lock();
            state.total_calls += 1;
            state.breaker.admit(Instant::now())
        };

        let probing = match decision {
            BreakerDecision::Reject { retry_in } => {
                debug!(?retry_in, "Circuit breaker open, rejecting call");
                return Err(AccessError::CircuitOpen { retry_in });
            }
            BreakerDecision::Probe => {
                info!("Circuit breaker half-open, letting probe through");
                true
            }
            BreakerDecision::Allow => false,
        };
        let mut probe = ProbeGuard {
            state: &self.state,
            armed: probing,
        };

        let mut attempt: u32 = 0;
        loop {
            let err = match operation() {
                Ok(value) => {
                    let mut state = self.state.lock();
                    state.total_retries += u64::from(attempt);
                    probe.disarm();
                    if state.breaker.record_success() {
                        info!("Circuit breaker closed after successful call");
                    }
                    if attempt > 0 {
                        info!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !self.should_retry(&err) {
                debug!(error = %err, "Not retrying: failure is not retryable");
                let mut state = self.state.lock();
                state.total_retries += u64::from(attempt);
                if probing {
                    state.breaker.abandon_probe();
                }
                probe.disarm();
                return Err(AccessError::Remote(err));
            }

            if attempt >= self.policy.max_retries {
                warn!(
                    "Max retries ({}) exceeded. Last error: {}",
                    self.policy.max_retries, err
                );
                let mut state = self.state.lock();
                state.total_retries += u64::from(attempt);
                state.total_failures += 1;
                probe.disarm();
                if state.breaker.record_failure(Instant::now()) {
                    warn!(
                        "Circuit breaker opened after {} consecutive failures",
                        state.breaker.consecutive_failures()
                    );
                }
                return Err(AccessError::RetryExhausted {
                    attempts: attempt + 1,
                    source: err,
                });
            }

            let delay = self.policy.delay_for(attempt);
            debug!(
                "Retrying in {:.2}s (attempt {}/{}). Error: {}",
                delay.as_secs_f64(),
                attempt + 1,
                self.policy.max_retries + 1,
                err
            );
            (self.sleeper)(delay);
            attempt += 1;
        }
    }

    fn should_retry(&self, err: &RemoteError) -> bool {
        let verdict = self.classifier.classify(err);
        match &self.retry_condition {
            Some(condition) => condition(err),
            None => verdict == ErrorVerdict::Retryable,
        }
    }

    // == Statistics ==
    /// Snapshot of call counters and breaker state.
    pub fn get_retry_statistics(&self) -> RetryStatistics {
        let state = self.state.lock();
        RetryStatistics {
            total_calls: state.total_calls,
            total_retries: state.total_retries,
            total_failures: state.total_failures,
            circuit_status: state.breaker.status(),
            circuit_breaker_open: state.breaker.status() != CircuitStatus::Closed,
            failure_count: state.breaker.consecutive_failures(),
        }
    }

    // == Circuit Breaker ==
    /// Current breaker state.
    pub fn circuit_status(&self) -> CircuitStatus {
        self.state.lock().breaker.status()
    }

    /// Closes the breaker and clears its failure count.
    pub fn reset_circuit_breaker(&self) {
        self.state.lock().breaker.reset();
        info!("Circuit breaker manually reset");
    }

    /// Zeroes call counters. Breaker state is left alone.
    pub fn reset_statistics(&self) {
        let mut state = self.state.lock();
        state.total_calls = 0;
        state.total_retries = 0;
        state.total_failures = 0;
    }
}
