//! Bounded retry with exponential backoff.

use std::time::Duration;

use rand::Rng;

/// How many times to attempt an operation and how long to wait in between.
///
/// The wait before attempt `n + 1` is `base_delay * 2^(n - 1)`, capped at
/// `max_delay`, plus a uniformly random `0..=jitter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero behaves like one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Duration::from_secs(10),
            jitter: Duration::ZERO,
        }
    }

    /// A single attempt.
    pub const fn never() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// `max_attempts` attempts back to back.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Short randomized pauses used when a remote raced its own initialization.
    pub const fn ordering_race() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(50),
            jitter: Duration::from_millis(100),
        }
    }

    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub const fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Whether another attempt is allowed after `failures` failed attempts.
    pub fn allows(&self, failures: u32) -> bool {
        failures < self.attempts()
    }

    /// Deterministic part of the wait after `failures` failed attempts.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Full wait after `failures` failed attempts, jitter included.
    pub fn delay(&self, failures: u32) -> Duration {
        let backoff = self.backoff(failures);
        if self.jitter.is_zero() {
            return backoff;
        }
        let jitter_ms = self.jitter.as_millis().min(u64::MAX as u128) as u64;
        backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500)).with_max_delay(Duration::from_secs(5))
    }
}
