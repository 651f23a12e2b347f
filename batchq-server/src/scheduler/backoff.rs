//! Retry backoff
//!
//! Exponential backoff with a cap: the delay before retry `n` (0-based) is
//! `initial * 2^n`, never more than `max`. A jitter ratio shaves a random
//! fraction off each delay so that jobs failing at the same moment do not
//! retry in lockstep.

use std::time::Duration;

/// Backoff policy for failed extraction attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    /// Fraction in `[0.0, 1.0]` of each delay that may be randomly removed
    pub jitter: f64,
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        self.delay_with_sample(retry, rand::random::<f64>())
    }

    /// Deterministic form of [`delay`](Self::delay) for a sample in `[0, 1)`
    pub fn delay_with_sample(&self, retry: u32, sample: f64) -> Duration {
        let initial_ms = self.initial.as_millis() as f64;
        let max_ms = self.max.as_millis() as f64;

        let exponential = initial_ms * 2f64.powi(retry.min(32) as i32);
        let capped = exponential.min(max_ms);

        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = 1.0 - jitter * sample.clamp(0.0, 1.0);

        Duration::from_millis((capped * factor).round() as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1_000),
            max: Duration::from_millis(30_000),
            jitter: 0.2,
        }
    }
}
