use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::client::CallError;
use crate::http::server::AppState;
use crate::resilience::CircuitBreakerState;

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub destination: String,
    pub operation: String,
    pub state: Option<CircuitBreakerState>,
}

pub async fn reset_breaker(
    State(state): State<AppState>,
    Path((destination, operation)): Path<(String, String)>,
) -> Result<Json<ResetResponse>, (StatusCode, Json<Value>)> {
    match state.orchestrator.reset_breaker(&destination, &operation) {
        Ok(true) => {
            tracing::info!(destination = %destination, operation = %operation, "Circuit breaker reset via admin API");
            let breaker = state
                .orchestrator
                .client(&destination)
                .and_then(|c| c.breaker_state(&operation));
            Ok(Json(ResetResponse {
                destination,
                operation,
                state: breaker,
            }))
        }
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no circuit breaker for {destination}:{operation}") })),
        )),
        Err(e @ CallError::UnknownDestination(_)) => {
            Err((StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}
