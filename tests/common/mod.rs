//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use courier::resilience::{CircuitBreaker, CircuitBreakerState};
use courier::transport::{BrokerTransport, TransportError};

/// What a scripted transport does on a given attempt.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(Value),
    Fail(TransportError),
    /// Never answers; the caller's timeout must fire.
    Hang,
    /// Answer after a delay.
    Slow(Duration, Value),
}

/// Transport that plays back a script, repeating the last step forever,
/// and counts how often it was invoked.
pub struct ScriptedTransport {
    script: Vec<Step>,
    calls: AtomicU32,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicU32::new(0),
        })
    }

    /// Fail `n` times with a connection error, then reply with `reply`.
    pub fn fail_then_succeed(n: usize, reply: Value) -> Arc<Self> {
        let mut script = vec![Step::Fail(TransportError::Disconnected); n];
        script.push(Step::Reply(reply));
        Self::new(script)
    }

    pub fn always_fail() -> Arc<Self> {
        Self::new(vec![Step::Fail(TransportError::Disconnected)])
    }

    pub fn always_hang() -> Arc<Self> {
        Self::new(vec![Step::Hang])
    }

    pub fn always_ok() -> Arc<Self> {
        Self::new(vec![Step::Reply(json!({ "ok": true }))])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn play(&self) -> Result<Value, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let step = self
            .script
            .get(n)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or(Step::Hang);

        match step {
            Step::Reply(value) => Ok(value),
            Step::Fail(e) => Err(e),
            Step::Hang => std::future::pending().await,
            Step::Slow(delay, value) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
        }
    }
}

#[async_trait]
impl BrokerTransport for ScriptedTransport {
    async fn emit(&self, _channel: &str, _operation: &str, _payload: Value) -> Result<(), TransportError> {
        self.play().await.map(|_| ())
    }

    async fn send(&self, _channel: &str, _operation: &str, _payload: Value) -> Result<Value, TransportError> {
        self.play().await
    }
}

/// Wraps a scripted transport and copies a breaker's state at the start of
/// every attempt, before the attempt's outcome is recorded.
pub struct ObservedTransport {
    inner: Arc<ScriptedTransport>,
    breaker: Mutex<Option<Arc<CircuitBreaker>>>,
    seen: Mutex<Vec<CircuitBreakerState>>,
}

impl ObservedTransport {
    pub fn new(inner: Arc<ScriptedTransport>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            breaker: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn watch(&self, breaker: Arc<CircuitBreaker>) {
        *self.breaker.lock() = Some(breaker);
    }

    pub fn seen(&self) -> Vec<CircuitBreakerState> {
        self.seen.lock().clone()
    }

    fn observe(&self) {
        if let Some(breaker) = self.breaker.lock().as_ref() {
            self.seen.lock().push(breaker.snapshot());
        }
    }
}

#[async_trait]
impl BrokerTransport for ObservedTransport {
    async fn emit(&self, channel: &str, operation: &str, payload: Value) -> Result<(), TransportError> {
        self.observe();
        self.inner.emit(channel, operation, payload).await
    }

    async fn send(&self, channel: &str, operation: &str, payload: Value) -> Result<Value, TransportError> {
        self.observe();
        self.inner.send(channel, operation, payload).await
    }
}
