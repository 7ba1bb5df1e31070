//! Per-process lifecycle hooks.
//!
//! A process supplies one `LifecycleHooks` implementation; the orchestrator
//! drives it through a fixed start/stop sequence.

use async_trait::async_trait;

use crate::client::ResilientServiceClient;
use crate::orchestrator::ServiceOrchestrator;

/// Error type returned by hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    /// Register every destination this process calls.
    async fn declare_clients(&self, orchestrator: &ServiceOrchestrator) -> Result<(), HookError>;

    /// Post-connect setup for one destination, e.g. subscribing reply channels.
    async fn after_connect(
        &self,
        destination: &str,
        _client: &ResilientServiceClient,
    ) -> Result<(), HookError> {
        tracing::debug!(destination = %destination, "No post-connect setup");
        Ok(())
    }

    /// Anything else the process needs before it reports ready.
    async fn initialize_resources(&self, _orchestrator: &ServiceOrchestrator) -> Result<(), HookError> {
        Ok(())
    }

    /// Release process resources during shutdown.
    async fn cleanup_resources(&self, _orchestrator: &ServiceOrchestrator) -> Result<(), HookError> {
        Ok(())
    }
}

/// Hooks for a process whose destinations are registered by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

#[async_trait]
impl LifecycleHooks for NoopHooks {
    async fn declare_clients(&self, _orchestrator: &ServiceOrchestrator) -> Result<(), HookError> {
        Ok(())
    }
}
