//! Admin routes that change runtime state.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::post, Router};

use self::auth::admin_auth_middleware;
use self::handlers::reset_breaker;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/circuit-breakers/{destination}/{operation}/reset",
            post(reset_breaker),
        )
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
