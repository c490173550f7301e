//! Rate-limit backoff policy for claim verification.
//!
//! Every attempt is preceded by `delay + U[0, jitter]`. A rate-limit failure
//! doubles the delay up to `max_delay`. At most `max_attempts` attempts are
//! made per claim.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(20);
pub const DEFAULT_JITTER: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackoffConfigError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("max delay ({max:?}) must not be below the initial delay ({initial:?})")]
    MaxBelowInitial { initial: Duration, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    jitter: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            jitter: DEFAULT_JITTER,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl BackoffPolicy {
    pub fn new(
        initial_delay: Duration,
        jitter: Duration,
        max_delay: Duration,
        max_attempts: u32,
    ) -> Result<Self, BackoffConfigError> {
        if max_attempts == 0 {
            return Err(BackoffConfigError::ZeroAttempts);
        }
        if max_delay < initial_delay {
            return Err(BackoffConfigError::MaxBelowInitial {
                initial: initial_delay,
                max: max_delay,
            });
        }
        Ok(Self {
            initial_delay,
            jitter,
            max_delay,
            max_attempts,
        })
    }

    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    #[must_use]
    pub const fn jitter(&self) -> Duration {
        self.jitter
    }

    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after one more rate-limit signal: `min(2 * delay, max_delay)`.
    #[must_use]
    pub fn grow(&self, delay: Duration) -> Duration {
        delay
            .checked_mul(2)
            .map_or(self.max_delay, |doubled| doubled.min(self.max_delay))
    }

    /// Actual wait before an attempt: `delay` plus uniform jitter in `[0, jitter]`.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    #[must_use]
    pub fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter.is_zero() {
            return delay;
        }
        let extra = Duration::try_from_secs_f64(self.jitter.as_secs_f64() * rand::random::<f64>())
            .map_or(self.jitter, |extra| extra.min(self.jitter));
        delay.saturating_add(extra)
    }

    /// Nominal (unjittered) delay before each attempt, in order.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial_delay), |delay| Some(self.grow(*delay)))
            .take(self.max_attempts as usize)
    }
}
