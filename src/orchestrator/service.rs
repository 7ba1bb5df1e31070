//! The service orchestrator.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

use crate::client::{CallError, CallKind, CallOptions, CallPolicy, ResilientServiceClient};
use crate::config::{BreakerConfig, CourierConfig, DestinationConfig};
use crate::discovery::{ServiceDescriptor, ServiceInfo, ServiceRegistry};
use crate::health::{HealthSnapshot, HealthSnapshotProvider};
use crate::lifecycle::Shutdown;
use crate::orchestrator::hooks::{HookError, LifecycleHooks, NoopHooks};
use crate::orchestrator::report::{BreakerReport, LifecycleState, StatusReport};
use crate::transport::BrokerTransport;

/// Errors from the start/stop sequence.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A lifecycle hook failed during startup.
    #[error("startup failed during {stage}: {source}")]
    Hook {
        stage: &'static str,
        #[source]
        source: HookError,
    },

    /// The requested transition is not valid from the current state.
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: LifecycleState,
    },
}

/// Owns the destinations of one process and answers status queries.
pub struct ServiceOrchestrator {
    descriptor: ServiceDescriptor,
    clients: RwLock<Vec<Arc<ResilientServiceClient>>>,
    declared: Vec<DestinationConfig>,
    breaker_config: BreakerConfig,
    policy: Arc<ArcSwap<CallPolicy>>,
    health: HealthSnapshotProvider,
    registry: Arc<ServiceRegistry>,
    hooks: Arc<dyn LifecycleHooks>,
    shutdown: Shutdown,
    state: RwLock<LifecycleState>,
}

impl ServiceOrchestrator {
    pub fn new(config: &CourierConfig) -> Self {
        Self {
            descriptor: ServiceDescriptor::from(&config.service),
            clients: RwLock::new(Vec::new()),
            declared: config.destinations.clone(),
            breaker_config: config.breaker,
            policy: Arc::new(ArcSwap::from_pointee(CallPolicy::from_config(&config.calls))),
            health: HealthSnapshotProvider::new(config.health),
            registry: Arc::new(ServiceRegistry::new()),
            hooks: Arc::new(NoopHooks),
            shutdown: Shutdown::new(),
            state: RwLock::new(LifecycleState::Created),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn LifecycleHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Share a registry with other components of the process.
    pub fn with_registry(mut self, registry: Arc<ServiceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_health_provider(mut self, health: HealthSnapshotProvider) -> Self {
        self.health = health;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Destinations declared in configuration.
    pub fn declared_destinations(&self) -> &[DestinationConfig] {
        &self.declared
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    /// Register `transport` under `destination`, replacing any previous client.
    ///
    /// Channel and policy overrides come from the matching `[[destinations]]`
    /// entry when one exists.
    pub fn register(
        &self,
        destination: &str,
        transport: Arc<dyn BrokerTransport>,
    ) -> Arc<ResilientServiceClient> {
        let mut client = ResilientServiceClient::new(destination, transport)
            .with_breaker_config(self.breaker_config)
            .with_policy(self.policy.clone())
            .with_shutdown(self.shutdown.clone());

        if let Some(declared) = self.declared.iter().find(|d| d.name == destination) {
            client = client
                .with_channel(declared.channel())
                .with_overrides(CallOptions::for_destination(declared));
        }

        self.insert(Arc::new(client))
    }

    /// Register a client built by the caller. It keeps its own policy and shutdown handle.
    pub fn register_client(&self, client: ResilientServiceClient) -> Arc<ResilientServiceClient> {
        self.insert(Arc::new(client))
    }

    fn insert(&self, client: Arc<ResilientServiceClient>) -> Arc<ResilientServiceClient> {
        let mut clients = self.clients.write();
        match clients.iter_mut().find(|c| c.destination() == client.destination()) {
            Some(slot) => {
                tracing::info!(destination = %client.destination(), "Replaced service client");
                *slot = client.clone();
            }
            None => {
                tracing::info!(
                    destination = %client.destination(),
                    channel = %client.channel(),
                    "Registered service client"
                );
                clients.push(client.clone());
            }
        }
        client
    }

    pub fn client(&self, destination: &str) -> Option<Arc<ResilientServiceClient>> {
        self.clients
            .read()
            .iter()
            .find(|c| c.destination() == destination)
            .cloned()
    }

    /// Registered destination names in registration order.
    pub fn destinations(&self) -> Vec<String> {
        self.clients
            .read()
            .iter()
            .map(|c| c.destination().to_string())
            .collect()
    }

    fn clients_snapshot(&self) -> Vec<Arc<ResilientServiceClient>> {
        self.clients.read().clone()
    }

    /// Run the startup sequence. Any failure is returned and leaves the
    /// orchestrator stopped.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        {
            let mut state = self.state.write();
            if *state != LifecycleState::Created {
                return Err(OrchestratorError::InvalidState {
                    action: "start",
                    state: *state,
                });
            }
            *state = LifecycleState::Starting;
        }

        tracing::info!(service = %self.descriptor.name, "Service is initializing");

        match self.run_startup().await {
            Ok(()) => {
                *self.state.write() = LifecycleState::Ready;
                tracing::info!(
                    service = %self.descriptor.name,
                    destinations = self.clients.read().len(),
                    "Service initialized"
                );
                Ok(())
            }
            Err(e) => {
                *self.state.write() = LifecycleState::Stopped;
                tracing::error!(service = %self.descriptor.name, error = %e, "Service failed to initialize");
                Err(e)
            }
        }
    }

    async fn run_startup(&self) -> Result<(), OrchestratorError> {
        let hooks = self.hooks.clone();

        hooks
            .declare_clients(self)
            .await
            .map_err(|source| OrchestratorError::Hook {
                stage: "declare_clients",
                source,
            })?;

        for client in self.clients_snapshot() {
            hooks
                .after_connect(client.destination(), &client)
                .await
                .map_err(|source| OrchestratorError::Hook {
                    stage: "after_connect",
                    source,
                })?;
        }

        hooks
            .initialize_resources(self)
            .await
            .map_err(|source| OrchestratorError::Hook {
                stage: "initialize_resources",
                source,
            })?;

        self.registry.register(ServiceInfo {
            descriptor: self.descriptor.clone(),
            health: Some(self.health.sample()),
        });
        Ok(())
    }

    /// Run the shutdown sequence. Individual failures are logged; this always completes.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write();
            if matches!(*state, LifecycleState::Stopping | LifecycleState::Stopped) {
                return;
            }
            *state = LifecycleState::Stopping;
        }

        tracing::info!(service = %self.descriptor.name, "Service is shutting down");
        self.shutdown.trigger();

        if let Err(e) = self.hooks.cleanup_resources(self).await {
            tracing::error!(error = %e, "Error during resource cleanup");
        }

        for client in self.clients_snapshot() {
            if let Err(e) = client.transport().close().await {
                tracing::warn!(destination = %client.destination(), error = %e, "Failed to close transport");
            }
        }

        self.registry.deregister(&self.descriptor.name);
        *self.state.write() = LifecycleState::Stopped;
        tracing::info!(service = %self.descriptor.name, "Service shutdown completed");
    }

    /// Call `operation` on a registered destination.
    pub async fn call_named(
        &self,
        destination: &str,
        kind: CallKind,
        operation: &str,
        payload: Value,
        options: CallOptions,
    ) -> Result<Value, CallError> {
        let client = self
            .client(destination)
            .ok_or_else(|| CallError::UnknownDestination(destination.to_string()))?;
        client.call(kind, operation, payload, options).await
    }

    pub async fn send_to(
        &self,
        destination: &str,
        operation: &str,
        payload: Value,
        options: CallOptions,
    ) -> Result<Value, CallError> {
        self.call_named(destination, CallKind::Send, operation, payload, options)
            .await
    }

    pub async fn emit_to(
        &self,
        destination: &str,
        operation: &str,
        payload: Value,
        options: CallOptions,
    ) -> Result<(), CallError> {
        self.call_named(destination, CallKind::Emit, operation, payload, options)
            .await
            .map(|_| ())
    }

    /// Sample health now and remember it as this service's latest health.
    pub fn health(&self) -> HealthSnapshot {
        let snapshot = self.health.sample();
        self.registry.update_health(&self.descriptor.name, snapshot.clone());
        snapshot
    }

    /// Descriptor with the most recently recorded health.
    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            descriptor: self.descriptor.clone(),
            health: self
                .registry
                .get(&self.descriptor.name)
                .and_then(|info| info.health),
        }
    }

    pub fn circuit_breakers(&self) -> BreakerReport {
        self.clients
            .read()
            .iter()
            .map(|c| (c.destination().to_string(), c.breaker_states()))
            .collect()
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            service: self.descriptor.clone(),
            state: self.state(),
            health: self.health(),
            circuit_breakers: self.circuit_breakers(),
        }
    }

    /// Reset one breaker. `Ok(false)` if the operation has no breaker yet.
    pub fn reset_breaker(&self, destination: &str, operation: &str) -> Result<bool, CallError> {
        let client = self
            .client(destination)
            .ok_or_else(|| CallError::UnknownDestination(destination.to_string()))?;
        Ok(client.reset_breaker(operation))
    }

    pub fn policy(&self) -> CallPolicy {
        **self.policy.load()
    }

    /// Swap the default call policy; in-flight calls keep the one they started with.
    pub fn apply_policy(&self, policy: CallPolicy) {
        tracing::info!(
            timeout_ms = policy.timeout.as_millis() as u64,
            max_attempts = policy.max_attempts,
            use_circuit_breaker = policy.use_circuit_breaker,
            "Call policy updated"
        );
        self.policy.store(Arc::new(policy));
    }
}

impl std::fmt::Debug for ServiceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceOrchestrator")
            .field("descriptor", &self.descriptor)
            .field("state", &self.state())
            .field("destinations", &self.destinations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitStatus;
    use crate::transport::LocalBroker;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHooks {
        broker: LocalBroker,
        events: Mutex<Vec<String>>,
        fail_after_connect: bool,
    }

    #[async_trait]
    impl LifecycleHooks for RecordingHooks {
        async fn declare_clients(&self, orchestrator: &ServiceOrchestrator) -> Result<(), HookError> {
            self.events.lock().push("declare".into());
            orchestrator.register("user", Arc::new(self.broker.clone()));
            orchestrator.register("lesson", Arc::new(self.broker.clone()));
            Ok(())
        }

        async fn after_connect(
            &self,
            destination: &str,
            client: &ResilientServiceClient,
        ) -> Result<(), HookError> {
            if self.fail_after_connect {
                return Err("reply topic subscription failed".into());
            }
            self.events.lock().push(format!("connect:{destination}"));
            self.broker
                .subscribe(client.channel(), "ping", |_| async { json!({ "pong": true }) });
            Ok(())
        }

        async fn initialize_resources(&self, _orchestrator: &ServiceOrchestrator) -> Result<(), HookError> {
            self.events.lock().push("resources".into());
            Ok(())
        }

        async fn cleanup_resources(&self, _orchestrator: &ServiceOrchestrator) -> Result<(), HookError> {
            self.events.lock().push("cleanup".into());
            Err("cleanup exploded".into())
        }
    }

    fn config() -> CourierConfig {
        let mut config = CourierConfig::default();
        config.service.name = "api-gateway".into();
        let mut user = DestinationConfig::new("user");
        user.channel = Some("user_queue".into());
        user.max_attempts = Some(1);
        config.destinations.push(user);
        config
    }

    #[tokio::test]
    async fn test_start_runs_hooks_in_order() {
        let hooks = Arc::new(RecordingHooks::default());
        let orchestrator = ServiceOrchestrator::new(&config()).with_hooks(hooks.clone());

        orchestrator.start().await.unwrap();
        assert!(orchestrator.is_ready());
        assert_eq!(
            *hooks.events.lock(),
            vec!["declare", "connect:user", "connect:lesson", "resources"]
        );
        assert_eq!(orchestrator.destinations(), vec!["user", "lesson"]);
        assert_eq!(orchestrator.client("user").unwrap().channel(), "user_queue");
        assert_eq!(orchestrator.client("lesson").unwrap().channel(), "lesson");
        assert!(orchestrator.registry().get("api-gateway").is_some());

        let reply = orchestrator
            .send_to("user", "ping", json!({}), CallOptions::new())
            .await
            .unwrap();
        assert_eq!(reply["pong"], true);
    }

    #[tokio::test]
    async fn test_startup_failure_is_propagated() {
        let hooks = Arc::new(RecordingHooks {
            fail_after_connect: true,
            ..Default::default()
        });
        let orchestrator = ServiceOrchestrator::new(&config()).with_hooks(hooks);

        let err = orchestrator.start().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Hook { stage: "after_connect", .. }));
        assert_eq!(orchestrator.state(), LifecycleState::Stopped);
        assert!(orchestrator.start().await.is_err());
    }

    #[tokio::test]
    async fn test_stop_completes_despite_cleanup_failure() {
        let hooks = Arc::new(RecordingHooks::default());
        let orchestrator = ServiceOrchestrator::new(&config()).with_hooks(hooks.clone());
        orchestrator.start().await.unwrap();

        orchestrator.stop().await;
        assert_eq!(orchestrator.state(), LifecycleState::Stopped);
        assert!(hooks.events.lock().contains(&"cleanup".to_string()));
        assert!(orchestrator.shutdown().is_triggered());
        assert!(orchestrator.registry().is_empty());
        assert!(!hooks.broker.is_connected());

        let err = orchestrator
            .send_to("user", "ping", json!({}), CallOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, CallError::ShuttingDown);

        // Second stop is a no-op.
        orchestrator.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_destination() {
        let orchestrator = ServiceOrchestrator::new(&CourierConfig::default());
        let err = orchestrator
            .send_to("billing", "charge", json!({}), CallOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, CallError::UnknownDestination("billing".into()));
        assert!(orchestrator.reset_breaker("billing", "charge").is_err());
    }

    #[tokio::test]
    async fn test_reregistration_replaces_client() {
        let orchestrator = ServiceOrchestrator::new(&CourierConfig::default());
        let first = orchestrator.register("quiz", Arc::new(LocalBroker::new()));
        first.breaker("submit").record_failure();

        let second = orchestrator.register("quiz", Arc::new(LocalBroker::new()));
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(orchestrator.destinations(), vec!["quiz"]);
        assert!(orchestrator.circuit_breakers()["quiz"].is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_report_includes_breakers() {
        let orchestrator = ServiceOrchestrator::new(&config());
        let broker = LocalBroker::new();
        broker.disconnect();
        orchestrator.register("user", Arc::new(broker));
        orchestrator.register("media", Arc::new(LocalBroker::new()));

        let _ = orchestrator
            .send_to("user", "get-user-profile", json!({}), CallOptions::new())
            .await;

        let report = orchestrator.status_report();
        assert_eq!(report.service.name, "api-gateway");
        assert_eq!(report.state, LifecycleState::Created);
        let user = &report.circuit_breakers["user"]["get-user-profile"];
        // Destination override limits this call to one attempt.
        assert_eq!(user.failure_count, 1);
        assert_eq!(user.status, CircuitStatus::Closed);
        assert!(report.circuit_breakers["media"].is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["circuitBreakers"]["user"]["get-user-profile"]["failureCount"].is_number());
    }

    #[tokio::test]
    async fn test_apply_policy_affects_next_call() {
        let orchestrator = ServiceOrchestrator::new(&CourierConfig::default());
        let broker = LocalBroker::new();
        broker.subscribe("slow", "work", |_| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            json!({ "done": true })
        });
        orchestrator.register("slow", Arc::new(broker));

        let mut policy = orchestrator.policy();
        policy.timeout = Duration::from_millis(20);
        policy.max_attempts = 1;
        orchestrator.apply_policy(policy);

        let err = orchestrator
            .send_to("slow", "work", json!({}), CallOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, CallError::Timeout { timeout_ms: 20 });
    }

    #[test]
    fn test_info_carries_latest_health() {
        let orchestrator = ServiceOrchestrator::new(&config());
        assert!(orchestrator.info().health.is_none());

        orchestrator.registry().register(ServiceInfo {
            descriptor: orchestrator.descriptor().clone(),
            health: None,
        });
        let sampled = orchestrator.health();
        assert_eq!(orchestrator.info().health, Some(sampled));
    }
}
