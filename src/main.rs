//! Courier daemon.
//!
//! Loads a TOML config, registers every configured destination on an
//! in-process broker, serves status endpoints and hot-reloads the call
//! policy when the config file changes.
//!
//! ```text
//!   config.toml ──▶ loader ──▶ ServiceOrchestrator ──▶ ResilientServiceClient ×N ──▶ LocalBroker
//!        │                          ▲      │
//!        └── watcher ── CallPolicy ─┘      └──▶ StatusServer (/health /info /circuit-breakers /status)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use courier::client::{CallPolicy, ResilientServiceClient};
use courier::config::{load_config, watcher::ConfigWatcher, CourierConfig, DestinationConfig};
use courier::http::{AppState, StatusServer};
use courier::lifecycle::signals::wait_for_termination;
use courier::observability::{logging, metrics};
use courier::orchestrator::{HookError, LifecycleHooks, ServiceOrchestrator};
use courier::transport::LocalBroker;

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Resilient service-call daemon with status endpoints", long_about = None)]
struct Cli {
    /// Path to the TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Registers each configured destination on the local broker and answers
/// `ping` on its channel.
struct DaemonHooks {
    broker: LocalBroker,
    destinations: Vec<DestinationConfig>,
}

#[async_trait]
impl LifecycleHooks for DaemonHooks {
    async fn declare_clients(&self, orchestrator: &ServiceOrchestrator) -> Result<(), HookError> {
        for destination in &self.destinations {
            orchestrator.register(&destination.name, Arc::new(self.broker.clone()));
        }
        Ok(())
    }

    async fn after_connect(
        &self,
        destination: &str,
        client: &ResilientServiceClient,
    ) -> Result<(), HookError> {
        let name = destination.to_string();
        self.broker.subscribe(client.channel(), "ping", move |_| {
            let name = name.clone();
            async move { json!({ "pong": true, "destination": name }) }
        });
        Ok(())
    }

    async fn cleanup_resources(&self, _orchestrator: &ServiceOrchestrator) -> Result<(), HookError> {
        tracing::info!(subscriptions = self.broker.subscription_count(), "Releasing broker subscriptions");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CourierConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "courier starting");

    tracing::info!(
        service = %config.service.name,
        destinations = config.destinations.len(),
        timeout_ms = config.calls.timeout_ms,
        max_attempts = config.calls.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let hooks = DaemonHooks {
        broker: LocalBroker::new(),
        destinations: config.destinations.clone(),
    };
    let orchestrator = Arc::new(ServiceOrchestrator::new(&config).with_hooks(Arc::new(hooks)));
    orchestrator.start().await?;

    // Kept alive for the lifetime of the process.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.with_current(config.clone()).run()?;
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    orchestrator.apply_policy(CallPolicy::from_config(&new_config.calls));
                }
            });
            Some(handle)
        }
        None => None,
    };

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let state = AppState::new(orchestrator.clone(), &config.admin);
    let server = StatusServer::new(state, &config.server);
    let server_task = tokio::spawn(server.run(listener, orchestrator.shutdown().clone()));

    wait_for_termination().await;
    orchestrator.stop().await;

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Status server failed"),
        Err(e) => tracing::error!(error = %e, "Status server task panicked"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
