//! Metrics collection and exposition.
//!
//! # Metrics
//! - `courier_call_attempts_total` (counter): attempts by destination, operation, outcome
//! - `courier_call_duration_seconds` (histogram): per-attempt latency
//! - `courier_circuit_fast_fail_total` (counter): calls refused by an open breaker
//! - `courier_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `courier_health_status` (gauge): 0=healthy, 1=degraded, 2=unhealthy
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::HealthStatus;
use crate::resilience::CircuitStatus;

/// Initialize the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    if let Err(e) = builder.install() {
        tracing::error!(error = %e, "Failed to install Prometheus recorder");
    } else {
        tracing::info!(address = %addr, "Metrics exporter listening");
    }
}

/// Record the outcome of one transport attempt.
pub fn record_attempt(destination: &str, operation: &str, outcome: &'static str, start: Instant) {
    counter!(
        "courier_call_attempts_total",
        "destination" => destination.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "courier_call_duration_seconds",
        "destination" => destination.to_string(),
        "operation" => operation.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a call refused by an open breaker.
pub fn record_fast_fail(destination: &str, operation: &str) {
    counter!(
        "courier_circuit_fast_fail_total",
        "destination" => destination.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a breaker's current status.
pub fn record_breaker_state(destination: &str, operation: &str, status: CircuitStatus) {
    let value = match status {
        CircuitStatus::Closed => 0.0,
        CircuitStatus::HalfOpen => 1.0,
        CircuitStatus::Open => 2.0,
    };
    gauge!(
        "courier_circuit_state",
        "destination" => destination.to_string(),
        "operation" => operation.to_string()
    )
    .set(value);
}

/// Record the latest process health classification.
pub fn record_health(status: HealthStatus) {
    let value = match status {
        HealthStatus::Healthy => 0.0,
        HealthStatus::Degraded => 1.0,
        HealthStatus::Unhealthy => 2.0,
    };
    gauge!("courier_health_status").set(value);
}
