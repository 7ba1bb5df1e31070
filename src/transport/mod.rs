//! Broker transport subsystem.
//!
//! # Data Flow
//! ```text
//! ResilientServiceClient
//!     → BrokerTransport::send / emit (channel, operation, payload)
//!     → broker (in-process: local.rs)
//!     → reply.rs (detect application-level failures in the reply)
//! ```
//!
//! # Design Decisions
//! - The transport handle is long-lived and shared; never created per call
//! - The transport knows nothing about retries or breakers
//! - Payloads are `serde_json::Value`; wire encoding is the broker's business

pub mod local;
pub mod reply;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use local::LocalBroker;

/// Broker-level failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Broker connection is down.
    #[error("broker connection is down")]
    Disconnected,

    /// Nothing is consuming `operation` on `channel`.
    #[error("no subscriber for '{operation}' on channel '{channel}'")]
    NoSubscriber { channel: String, operation: String },

    /// The consumer went away before replying.
    #[error("reply channel closed for '{operation}' on channel '{channel}'")]
    ReplyDropped { channel: String, operation: String },

    /// Any other broker failure.
    #[error("broker error: {0}")]
    Other(String),
}

/// Fire-and-forget and request/reply over a message broker.
#[async_trait]
pub trait BrokerTransport: Send + Sync + 'static {
    /// Publish without waiting for a reply.
    async fn emit(&self, channel: &str, operation: &str, payload: Value) -> Result<(), TransportError>;

    /// Publish and wait for the correlated reply.
    async fn send(&self, channel: &str, operation: &str, payload: Value) -> Result<Value, TransportError>;

    /// Release the broker connection.
    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
