//! Bounded exponential-backoff retry
//!
//! One policy type serves both retry levels of the engine: page requests in
//! the fetcher and whole-day attempts in the batch runner. Each level builds
//! its own [`RetryPolicy`] from configuration and owns the [`RetryState`] for
//! the operation it is retrying.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Attempt budget and backoff curve for one retry level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (always at least 1)
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub base_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    ///
    /// `base_delay * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent);
        match factor.and_then(|f| self.base_delay.checked_mul(f)) {
            Some(delay) => delay.min(self.max_delay),
            None => self.max_delay,
        }
    }

    /// Starts tracking a new operation under this policy
    pub fn start(&self) -> RetryState {
        RetryState {
            policy: *self,
            attempts: 0,
        }
    }
}

/// Attempt counter for one operation being retried
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryState {
    /// Marks the start of an attempt and returns its 1-based number
    pub fn begin(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Number of attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records that the current attempt failed
    ///
    /// Returns the delay before the next attempt, or None when the budget is spent.
    pub fn record_failure(&self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            None
        } else {
            Some(self.policy.delay_for(self.attempts))
        }
    }
}

/// Sleeps for `delay` unless `cancel` fires first
///
/// Returns false if the wait was cut short by cancellation.
pub async fn backoff(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
