//! Aggregated status for external endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::discovery::ServiceDescriptor;
use crate::health::HealthSnapshot;
use crate::resilience::CircuitBreakerState;

/// Breaker states keyed by destination, then by operation.
pub type BreakerReport = BTreeMap<String, BTreeMap<String, CircuitBreakerState>>;

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Created,
    Starting,
    Ready,
    Stopping,
    Stopped,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Created => "created",
            LifecycleState::Starting => "starting",
            LifecycleState::Ready => "ready",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Health plus every breaker, as served by `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub service: ServiceDescriptor,
    pub state: LifecycleState,
    pub health: HealthSnapshot,
    pub circuit_breakers: BreakerReport,
}
