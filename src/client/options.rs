//! Call policy and per-call overrides.

use std::time::Duration;

use crate::config::{CallsConfig, DestinationConfig};
use crate::resilience::Backoff;

/// Fully resolved settings for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub use_circuit_breaker: bool,
    pub backoff: Backoff,
}

impl CallPolicy {
    pub fn from_config(config: &CallsConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            max_attempts: config.max_attempts.max(1),
            use_circuit_breaker: config.use_circuit_breaker,
            backoff: Backoff {
                strategy: config.backoff,
                base_delay: Duration::from_millis(config.base_delay_ms),
                max_delay: Duration::from_millis(config.max_delay_ms),
                jitter: config.jitter,
            },
        }
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from_config(&CallsConfig::default())
    }
}

/// Optional overrides layered over a [`CallPolicy`].
///
/// ```
/// use courier::client::CallOptions;
///
/// let options = CallOptions::new().timeout_ms(250).max_attempts(1);
/// assert_eq!(options.max_attempts, Some(1));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub timeout_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub use_circuit_breaker: Option<bool>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn use_circuit_breaker(mut self, enabled: bool) -> Self {
        self.use_circuit_breaker = Some(enabled);
        self
    }

    /// Overrides declared for a destination in configuration.
    pub fn for_destination(config: &DestinationConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            max_attempts: config.max_attempts,
            use_circuit_breaker: None,
        }
    }

    /// Apply these overrides on top of `base`.
    pub fn resolve(&self, base: &CallPolicy) -> CallPolicy {
        CallPolicy {
            timeout: self.timeout_ms.map(Duration::from_millis).unwrap_or(base.timeout),
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts).max(1),
            use_circuit_breaker: self.use_circuit_breaker.unwrap_or(base.use_circuit_breaker),
            backoff: base.backoff,
        }
    }
}
