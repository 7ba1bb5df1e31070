//! Point-in-time health judgment for the current process.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::HealthConfig;
use crate::health::probe::{ResourceProbe, ResourceUsage, SystemProbe};
use crate::observability::metrics;

/// Health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health of the process at `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Seconds since the provider was created.
    pub uptime: f64,
    pub memory_used: u64,
    pub memory_total: u64,
    pub memory_percentage: f64,
    pub cpu_usage: f64,
}

/// Classify usage percentages against the configured thresholds.
pub fn classify(memory_percent: f64, cpu_percent: f64, thresholds: &HealthConfig) -> HealthStatus {
    if memory_percent > thresholds.unhealthy_percent || cpu_percent > thresholds.unhealthy_percent {
        HealthStatus::Unhealthy
    } else if memory_percent > thresholds.degraded_percent || cpu_percent > thresholds.degraded_percent {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// Samples process health on demand. Never fails.
pub struct HealthSnapshotProvider {
    probe: Box<dyn ResourceProbe>,
    thresholds: HealthConfig,
    started: Instant,
}

impl HealthSnapshotProvider {
    pub fn new(thresholds: HealthConfig) -> Self {
        Self::with_probe(Box::new(SystemProbe::new()), thresholds)
    }

    pub fn with_probe(probe: Box<dyn ResourceProbe>, thresholds: HealthConfig) -> Self {
        Self {
            probe,
            thresholds,
            started: Instant::now(),
        }
    }

    /// Take a fresh sample. Measurement failures yield an unhealthy, zeroed snapshot.
    pub fn sample(&self) -> HealthSnapshot {
        let snapshot = match self.probe.measure() {
            Ok(usage) => self.judge(usage),
            Err(e) => {
                tracing::error!(error = %e, "Health check failed");
                HealthSnapshot {
                    status: HealthStatus::Unhealthy,
                    timestamp: now_ms(),
                    uptime: self.uptime_secs(),
                    memory_used: 0,
                    memory_total: 0,
                    memory_percentage: 0.0,
                    cpu_usage: 0.0,
                }
            }
        };

        tracing::debug!(status = ?snapshot.status, "Health check completed");
        metrics::record_health(snapshot.status);
        snapshot
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn judge(&self, usage: ResourceUsage) -> HealthSnapshot {
        let memory_percentage = usage.memory_percent();
        HealthSnapshot {
            status: classify(memory_percentage, usage.cpu_percent, &self.thresholds),
            timestamp: now_ms(),
            uptime: self.uptime_secs(),
            memory_used: usage.memory_used,
            memory_total: usage.memory_total,
            memory_percentage,
            cpu_usage: usage.cpu_percent,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
