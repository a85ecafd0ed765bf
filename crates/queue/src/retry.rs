//! Retry backoff policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff configuration for failed tasks.
///
/// The n-th re-queue of a task (1-indexed by its `retry_count`) waits
/// `base_delay * 2^n`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Base unit of the backoff.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            ..Default::default()
        }
    }

    /// Delay before the given re-queue (`retry_count` after increment).
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(retry_count);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}
