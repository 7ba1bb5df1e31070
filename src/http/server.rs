//! Status server setup.
//!
//! # Responsibilities
//! - Create the axum router with status and admin routes
//! - Wire up middleware (tracing, request timeout, request ID)
//! - Serve on a listener until the shutdown coordinator fires

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::{AdminConfig, ServerConfig};
use crate::http::handlers;
use crate::lifecycle::Shutdown;
use crate::orchestrator::ServiceOrchestrator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ServiceOrchestrator>,
    /// Bearer token for admin routes. Empty disables them.
    pub admin_key: Arc<str>,
}

impl AppState {
    pub fn new(orchestrator: Arc<ServiceOrchestrator>, admin: &AdminConfig) -> Self {
        Self {
            orchestrator,
            admin_key: Arc::from(admin.api_key.as_str()),
        }
    }
}

/// HTTP server exposing orchestrator status.
pub struct StatusServer {
    router: Router,
}

impl StatusServer {
    pub fn new(state: AppState, config: &ServerConfig) -> Self {
        let router = Self::build_router(state, Duration::from_secs(config.request_timeout_secs));
        Self { router }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/info", get(handlers::info))
            .route("/circuit-breakers", get(handlers::circuit_breakers))
            .route("/status", get(handlers::status))
            .route("/services", get(handlers::services))
            .with_state(state.clone())
            .merge(setup_admin_router(state))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Status server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.triggered().await })
            .await?;

        tracing::info!("Status server stopped");
        Ok(())
    }
}
