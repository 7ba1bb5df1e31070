//! Read-only status handlers.

use axum::{extract::State, Json};

use crate::discovery::ServiceInfo;
use crate::health::HealthSnapshot;
use crate::http::server::AppState;
use crate::orchestrator::report::{BreakerReport, StatusReport};

pub async fn health(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(state.orchestrator.health())
}

pub async fn info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.orchestrator.info())
}

pub async fn circuit_breakers(State(state): State<AppState>) -> Json<BreakerReport> {
    Json(state.orchestrator.circuit_breakers())
}

pub async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.orchestrator.status_report())
}

/// Every service in the registry, sorted by name.
pub async fn services(State(state): State<AppState>) -> Json<Vec<ServiceInfo>> {
    Json(state.orchestrator.registry().all())
}
