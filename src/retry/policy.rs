//! Retry and backoff policy.
//!
//! Exponential backoff capped at `max_delay`, then perturbed by symmetric
//! multiplicative jitter. Jitter is applied after the cap so a jittered delay
//! stays within `max_delay * (1 + jitter_factor)`.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

// == Retry Policy ==
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on the pre-jitter delay
    pub max_delay: Duration,
    /// Geometric growth factor per attempt
    pub exponential_base: f64,
    /// Symmetric jitter as a fraction of the delay (0.1 = ±10%)
    pub jitter_factor: f64,
    /// Consecutive exhausted calls before the breaker opens
    pub circuit_breaker_threshold: u32,
    /// How long the breaker stays open before allowing a probe
    pub circuit_breaker_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter_factor: 0.1,
            circuit_breaker_threshold: 10,
            circuit_breaker_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Capped delay before jitter for a 0-based `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let max = self.max_delay.as_secs_f64();
        let exp = self.exponential_base.powf(f64::from(attempt));
        let raw = self.base_delay.as_secs_f64() * exp;
        // Overflowing growth saturates to the cap.
        let capped = if raw.is_finite() { raw.min(max) } else { max };
        Duration::try_from_secs_f64(capped.max(0.0)).unwrap_or(self.max_delay)
    }

    /// Applies jitter to `delay`. `unit` is a sample from `[-1, 1]`.
    pub fn jitter(&self, delay: Duration, unit: f64) -> Duration {
        let factor = self.jitter_factor.clamp(0.0, 1.0);
        let secs = delay.as_secs_f64();
        let jittered = secs + unit.clamp(-1.0, 1.0) * factor * secs;
        // Only overflows upward, so saturate.
        Duration::try_from_secs_f64(jittered.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Backoff for `attempt` with a fresh random jitter sample.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        if self.jitter_factor <= 0.0 {
            return base;
        }
        let unit = rand::thread_rng().gen_range(-1.0..=1.0);
        self.jitter(base, unit)
    }

    /// Upper bound on any single jittered delay.
    pub fn max_jittered_delay(&self) -> Duration {
        let factor = self.jitter_factor.clamp(0.0, 1.0);
        Duration::try_from_secs_f64(self.max_delay.as_secs_f64() * (1.0 + factor))
            .unwrap_or(Duration::MAX)
    }
}
