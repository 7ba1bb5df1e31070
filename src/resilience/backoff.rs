//! Retry backoff schedules.
//!
//! Linear backoff (`attempt * base`) is the default; exponential backoff with
//! optional jitter can be selected through configuration.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Shape of the delay curve between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    #[default]
    Linear,
    Exponential,
}

/// Backoff schedule resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub strategy: BackoffStrategy,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Backoff {
    pub fn linear(base_delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Linear,
            base_delay,
            max_delay: Duration::MAX,
            jitter: false,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis().min(u64::MAX as u128) as u64;
        match self.strategy {
            BackoffStrategy::Linear => linear_backoff(attempt, base_ms),
            BackoffStrategy::Exponential => calculate_backoff(attempt, base_ms, max_ms, self.jitter),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::linear(Duration::from_millis(1000))
    }
}

/// Linear backoff: attempt 1 waits `base`, attempt 2 waits `2 * base`, ...
pub fn linear_backoff(attempt: u32, base_ms: u64) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(attempt as u64))
}

/// Calculate exponential backoff delay, optionally with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, jitter: bool) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter_ms = if jitter && jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter_ms)
}
