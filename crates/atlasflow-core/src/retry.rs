//! Retry backoff policy
//!
//! The backoff schedule is a pure function of the attempt count so it can be
//! unit-tested without any live network dependency:
//!
//! `delay(attempt) = base * 2^attempt + offset`, capped at `max_delay`.

use crate::config::PipelineConfig;
use std::time::Duration;

/// Exponential backoff policy for transient fetch failures
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Maximum attempts per page (first try + retries)
    pub max_attempts: u32,
    /// Base delay, doubled per attempt
    pub base: Duration,
    /// Fixed offset added to every delay
    pub offset: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base: Duration::from_millis(1_000),
            offset: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base: Duration::from_millis(config.backoff_base_ms),
            offset: Duration::from_millis(config.backoff_offset_ms),
            max_delay: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay before retrying after the given failed attempt (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .as_millis()
            .saturating_mul(1u128 << attempt.min(32))
            .saturating_add(self.offset.as_millis());
        let capped = exp.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}
