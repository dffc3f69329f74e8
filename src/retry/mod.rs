//! Retry and circuit breaker
//!
//! Error classification, exponential backoff with jitter, and a circuit
//! breaker guarding a failing backend. `RetryHandler` ties them together.

mod breaker;
mod classify;
mod handler;
mod policy;

pub use breaker::{BreakerDecision, CircuitBreaker, CircuitStatus};
pub use classify::{ClassifierStats, ErrorClassifier, ErrorVerdict};
pub use handler::{RetryHandler, RetryStatistics};
pub use policy::RetryPolicy;
