//! Retry policy for transient store failures.

use std::time::Duration;

/// Bounded retry with exponential backoff.
///
/// `max_attempts` counts the first try, so the default of 3 means at most two
/// retries. The delay before retry `k` (1-based) is
/// `backoff_base * backoff_exponent^(k - 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_exponent: f64,
    /// Per-attempt limit; an attempt that runs longer fails as a transient timeout.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(3000),
            backoff_exponent: 1.5,
            attempt_timeout: Some(Duration::from_millis(10_000)),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.backoff_exponent.powi(retry.saturating_sub(1) as i32);
        let millis = self.backoff_base.as_millis() as f64 * factor;
        if millis.is_finite() && millis > 0.0 {
            Duration::from_millis(millis.round() as u64)
        } else {
            Duration::ZERO
        }
    }

    /// All delays a fully failing operation would sleep through, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts.max(1)).map(move |retry| self.backoff(retry))
    }

    /// Longest a fully failing operation can take when each attempt may spend
    /// `acquire` waiting for a pool slot and `acquire` again connecting.
    /// `None` without a per-attempt timeout.
    pub fn worst_case(&self, acquire: Duration) -> Option<Duration> {
        let attempt = self.attempt_timeout?;
        let per_attempt = acquire.saturating_mul(2).saturating_add(attempt);
        let attempts = per_attempt.saturating_mul(self.max_attempts.max(1));
        Some(self.delays().fold(attempts, Duration::saturating_add))
    }
}
