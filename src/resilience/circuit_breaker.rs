//! Circuit breaker for destination protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: destination assumed down, calls fail fast
//! - Half-Open: testing if destination recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: cooldown elapsed, next allow() is the probe
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! # Design Decisions
//! - One breaker per (destination, operation), created lazily, never removed
//! - Fail fast in Open state (no waiting for timeout)
//! - Concurrent probes in Half-Open are tolerated; counter updates are never lost
//! - Time is read from the Tokio clock so tests can pause and advance it

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Breaker status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitStatus::Closed => "CLOSED",
            CircuitStatus::Open => "OPEN",
            CircuitStatus::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only copy of a breaker, as exposed on the status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerState {
    pub status: CircuitStatus,
    pub failure_count: u32,
    pub success_count: u32,
    pub threshold: u32,
    /// Cooldown in milliseconds.
    pub cooldown: u64,
    /// Most recent failure, milliseconds since the Unix epoch.
    pub last_failure_at: Option<u64>,
}

#[derive(Debug)]
struct BreakerInner {
    status: CircuitStatus,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    last_failure_wall_ms: Option<u64>,
}

impl BreakerInner {
    fn closed() -> Self {
        Self {
            status: CircuitStatus::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            last_failure_wall_ms: None,
        }
    }
}

/// Fault-tracking state machine for one (destination, operation) key.
#[derive(Debug)]
pub struct CircuitBreaker {
    destination: String,
    operation: String,
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(
        destination: impl Into<String>,
        operation: impl Into<String>,
        threshold: u32,
        cooldown: Duration,
    ) -> Self {
        Self {
            destination: destination.into(),
            operation: operation.into(),
            threshold: threshold.max(1),
            cooldown,
            inner: Mutex::new(BreakerInner::closed()),
        }
    }

    pub fn from_config(
        destination: impl Into<String>,
        operation: impl Into<String>,
        config: &BreakerConfig,
    ) -> Self {
        Self::new(
            destination,
            operation,
            config.threshold,
            Duration::from_millis(config.cooldown_ms),
        )
    }

    /// Breaker key, `destination:operation`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.destination, self.operation)
    }

    /// Decide whether a call attempt may proceed.
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open and lets the
    /// caller through as the probe. Otherwise an open breaker refuses without
    /// touching its state.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.status {
            CircuitStatus::Closed | CircuitStatus::HalfOpen => true,
            CircuitStatus::Open => {
                let expired = inner
                    .last_failure
                    .is_some_and(|at| at.elapsed() >= self.cooldown);
                if expired {
                    self.transition(&mut inner, CircuitStatus::HalfOpen);
                }
                expired
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        inner.success_count = inner.success_count.saturating_add(1);
        if inner.status == CircuitStatus::HalfOpen {
            self.transition(&mut inner, CircuitStatus::Closed);
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.success_count = 0;
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.last_failure_wall_ms = Some(wall_clock_ms());

        let trip = inner.status == CircuitStatus::HalfOpen || inner.failure_count >= self.threshold;
        if trip && inner.status != CircuitStatus::Open {
            self.transition(&mut inner, CircuitStatus::Open);
        }
    }

    /// Read-only copy for reporting.
    pub fn snapshot(&self) -> CircuitBreakerState {
        let inner = self.inner.lock();
        CircuitBreakerState {
            status: inner.status,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            threshold: self.threshold,
            cooldown: self.cooldown.as_millis() as u64,
            last_failure_at: inner.last_failure_wall_ms,
        }
    }

    pub fn status(&self) -> CircuitStatus {
        self.inner.lock().status
    }

    /// Force the breaker closed and forget all history.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let previous = inner.status;
        *inner = BreakerInner::closed();
        if previous != CircuitStatus::Closed {
            tracing::info!(
                destination = %self.destination,
                operation = %self.operation,
                from = %previous,
                "Circuit breaker reset"
            );
        }
        metrics::record_breaker_state(&self.destination, &self.operation, CircuitStatus::Closed);
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitStatus) {
        let from = inner.status;
        inner.status = to;

        match to {
            CircuitStatus::Open => tracing::warn!(
                destination = %self.destination,
                operation = %self.operation,
                from = %from,
                failure_count = inner.failure_count,
                threshold = self.threshold,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                destination = %self.destination,
                operation = %self.operation,
                from = %from,
                to = %to,
                "Circuit breaker state changed"
            ),
        }
        metrics::record_breaker_state(&self.destination, &self.operation, to);
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Lazily populated breakers for one destination, keyed by operation.
#[derive(Debug)]
pub struct BreakerRegistry {
    destination: String,
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(destination: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            destination: destination.into(),
            config,
            breakers: DashMap::new(),
        }
    }

    /// Get the breaker for `operation`, creating it closed on first use.
    pub fn get_or_create(&self, operation: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(operation) {
            return existing.clone();
        }
        self.breakers
            .entry(operation.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::from_config(
                    self.destination.clone(),
                    operation,
                    &self.config,
                ))
            })
            .clone()
    }

    pub fn get(&self, operation: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(operation).map(|b| b.clone())
    }

    /// Snapshot every breaker created so far, ordered by operation.
    pub fn snapshot(&self) -> BTreeMap<String, CircuitBreakerState> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// Reset one breaker. Returns false if no call has created it yet.
    pub fn reset(&self, operation: &str) -> bool {
        match self.breakers.get(operation) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
