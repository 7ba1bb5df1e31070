//! Resilient call wrapper around one destination's broker handle.
//!
//! # Responsibilities
//! - Gate each logical call through the (destination, operation) breaker
//! - Bound every attempt with a timeout
//! - Retry transient failures with backoff, recording one breaker outcome per attempt
//! - Treat replies that carry an application error like any other failed attempt

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::{CallError, CallOptions, CallPolicy};
use crate::config::BreakerConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::{retries, timeouts, BreakerRegistry, CircuitBreaker, CircuitBreakerState};
use crate::transport::{reply, BrokerTransport};

/// Whether a reply is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Fire-and-forget.
    Emit,
    /// Request/reply.
    Send,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Emit => "emit",
            CallKind::Send => "send",
        }
    }
}

/// Timeout, retry and circuit-breaker wrapper for one destination.
pub struct ResilientServiceClient {
    destination: String,
    channel: String,
    transport: Arc<dyn BrokerTransport>,
    breakers: BreakerRegistry,
    policy: Arc<ArcSwap<CallPolicy>>,
    overrides: CallOptions,
    shutdown: Shutdown,
}

impl ResilientServiceClient {
    /// Wrap `transport` for `destination` with default policy and breaker settings.
    /// The broker channel defaults to the destination name.
    pub fn new(destination: impl Into<String>, transport: Arc<dyn BrokerTransport>) -> Self {
        let destination = destination.into();
        Self {
            channel: destination.clone(),
            breakers: BreakerRegistry::new(destination.clone(), BreakerConfig::default()),
            destination,
            transport,
            policy: Arc::new(ArcSwap::from_pointee(CallPolicy::default())),
            overrides: CallOptions::default(),
            shutdown: Shutdown::new(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Replace breaker settings. Existing breakers are discarded.
    pub fn with_breaker_config(mut self, config: BreakerConfig) -> Self {
        self.breakers = BreakerRegistry::new(self.destination.clone(), config);
        self
    }

    /// Share a hot-swappable default policy.
    pub fn with_policy(mut self, policy: Arc<ArcSwap<CallPolicy>>) -> Self {
        self.policy = policy;
        self
    }

    /// Destination-level overrides applied before per-call options.
    pub fn with_overrides(mut self, overrides: CallOptions) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn transport(&self) -> &Arc<dyn BrokerTransport> {
        &self.transport
    }

    /// Request/reply call.
    pub async fn send(&self, operation: &str, payload: Value, options: CallOptions) -> Result<Value, CallError> {
        self.call(CallKind::Send, operation, payload, options).await
    }

    /// Fire-and-forget call.
    pub async fn emit(&self, operation: &str, payload: Value, options: CallOptions) -> Result<(), CallError> {
        self.call(CallKind::Emit, operation, payload, options).await.map(|_| ())
    }

    /// Typed request/reply.
    pub async fn request<P, T>(&self, operation: &str, payload: &P, options: CallOptions) -> Result<T, CallError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_value(payload).map_err(|e| CallError::Codec(e.to_string()))?;
        let reply = self.send(operation, payload, options).await?;
        serde_json::from_value(reply).map_err(|e| CallError::Codec(e.to_string()))
    }

    /// Perform one logical call.
    ///
    /// Returns the reply for [`CallKind::Send`] and `Value::Null` for
    /// [`CallKind::Emit`]. After the last failed attempt the last error is
    /// returned unchanged.
    pub async fn call(
        &self,
        kind: CallKind,
        operation: &str,
        payload: Value,
        options: CallOptions,
    ) -> Result<Value, CallError> {
        if operation.is_empty() {
            return Err(CallError::InvalidOperation);
        }
        if self.shutdown.is_triggered() {
            return Err(CallError::ShuttingDown);
        }

        let policy = options.resolve(&self.overrides.resolve(&self.policy.load()));
        let breaker = self.breakers.get_or_create(operation);

        if policy.use_circuit_breaker && !breaker.allow() {
            tracing::warn!(
                destination = %self.destination,
                operation = %operation,
                "Circuit open, failing fast"
            );
            metrics::record_fast_fail(&self.destination, operation);
            return Err(CallError::CircuitOpen {
                destination: self.destination.clone(),
                operation: operation.to_string(),
            });
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();

            tracing::info!(
                destination = %self.destination,
                operation = %operation,
                kind = kind.as_str(),
                attempt,
                max_attempts = policy.max_attempts,
                "Calling destination"
            );

            match self.attempt(kind, operation, payload.clone(), &policy).await {
                Ok(reply) => {
                    if policy.use_circuit_breaker {
                        breaker.record_success();
                    }
                    metrics::record_attempt(&self.destination, operation, "success", started);
                    tracing::debug!(
                        destination = %self.destination,
                        operation = %operation,
                        attempt,
                        outcome = "success",
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Call succeeded"
                    );
                    return Ok(reply);
                }
                Err(err) => {
                    if policy.use_circuit_breaker {
                        breaker.record_failure();
                    }
                    metrics::record_attempt(&self.destination, operation, err.kind(), started);
                    tracing::warn!(
                        destination = %self.destination,
                        operation = %operation,
                        attempt,
                        outcome = err.kind(),
                        error = %err,
                        "Attempt failed"
                    );

                    let Some(delay) = retries::next_delay(&policy.backoff, &err, attempt, policy.max_attempts) else {
                        tracing::error!(
                            destination = %self.destination,
                            operation = %operation,
                            attempts = attempt,
                            error = %err,
                            "Call failed"
                        );
                        return Err(err);
                    };

                    tracing::debug!(
                        destination = %self.destination,
                        operation = %operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Backing off before retry"
                    );
                    if !retries::sleep_or_shutdown(delay, &self.shutdown).await {
                        tracing::info!(
                            destination = %self.destination,
                            operation = %operation,
                            attempt,
                            "Retry aborted by shutdown"
                        );
                        return Err(CallError::ShuttingDown);
                    }
                }
            }
        }
    }

    async fn attempt(
        &self,
        kind: CallKind,
        operation: &str,
        payload: Value,
        policy: &CallPolicy,
    ) -> Result<Value, CallError> {
        let transport = self.transport.as_ref();
        let channel = self.channel.as_str();

        let reply = timeouts::bounded(policy.timeout, async move {
            match kind {
                CallKind::Emit => transport.emit(channel, operation, payload).await.map(|_| Value::Null),
                CallKind::Send => transport.send(channel, operation, payload).await,
            }
        })
        .await?;

        match reply::application_error(&reply) {
            Some(message) => Err(CallError::RemoteApplication(message)),
            None => Ok(reply),
        }
    }

    /// Breaker for `operation`, created closed if no call has used it yet.
    pub fn breaker(&self, operation: &str) -> Arc<CircuitBreaker> {
        self.breakers.get_or_create(operation)
    }

    /// State of the breaker for `operation`, if one exists.
    pub fn breaker_state(&self, operation: &str) -> Option<CircuitBreakerState> {
        self.breakers.get(operation).map(|b| b.snapshot())
    }

    /// Every breaker created through this client, keyed by operation.
    pub fn breaker_states(&self) -> std::collections::BTreeMap<String, CircuitBreakerState> {
        self.breakers.snapshot()
    }

    /// Reset the breaker for `operation`. Returns false if it does not exist.
    pub fn reset_breaker(&self, operation: &str) -> bool {
        self.breakers.reset(operation)
    }

    pub fn reset_all_breakers(&self) {
        self.breakers.reset_all();
    }
}

impl std::fmt::Debug for ResilientServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientServiceClient")
            .field("destination", &self.destination)
            .field("channel", &self.channel)
            .field("breakers", &self.breakers.len())
            .finish()
    }
}
