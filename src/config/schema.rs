//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a courier
//! process. All types derive Serde traits for deserialization from config
//! files, and every field has a default so an empty file is a valid config.

use serde::{Deserialize, Serialize};

use crate::resilience::BackoffStrategy;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct CourierConfig {
    /// Identity of this process.
    pub service: ServiceConfig,

    /// Status server settings.
    pub server: ServerConfig,

    /// Default call policy for every destination.
    pub calls: CallsConfig,

    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Health classification thresholds.
    pub health: HealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin endpoint settings.
    pub admin: AdminConfig,

    /// Downstream services reachable over the broker.
    pub destinations: Vec<DestinationConfig>,
}

/// Static identity of the running process.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
    /// Advertised host; the `HOST` environment variable wins when set.
    pub host: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "courier".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            host: "localhost".to_string(),
            port: 8000,
        }
    }
}

/// Status server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Per-request timeout for status endpoints in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Default call policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CallsConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,

    /// Attempts per logical call, including the first.
    pub max_attempts: u32,

    /// Gate calls through the per-operation circuit breaker.
    pub use_circuit_breaker: bool,

    /// Delay curve between attempts.
    pub backoff: BackoffStrategy,

    /// Base delay in milliseconds.
    pub base_delay_ms: u64,

    /// Cap for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% jitter to exponential delays.
    pub jitter: bool,
}

impl Default for CallsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_attempts: 3,
            use_circuit_breaker: true,
            backoff: BackoffStrategy::Linear,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: false,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub threshold: u32,

    /// Time an open breaker waits before allowing a probe, in milliseconds.
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            cooldown_ms: 60_000,
        }
    }
}

/// Health thresholds, as percentages of memory or CPU in use.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    pub degraded_percent: f64,
    pub unhealthy_percent: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            degraded_percent: 70.0,
            unhealthy_percent: 90.0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token for mutating admin routes. Empty disables them.
    pub api_key: String,
}

/// A downstream destination.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DestinationConfig {
    /// Destination name used by callers.
    pub name: String,

    /// Broker channel; defaults to the destination name.
    #[serde(default)]
    pub channel: Option<String>,

    /// Override of `calls.timeout_ms`.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Override of `calls.max_attempts`.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl DestinationConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel: None,
            timeout_ms: None,
            max_attempts: None,
        }
    }

    pub fn channel(&self) -> &str {
        self.channel.as_deref().unwrap_or(&self.name)
    }
}
