//! Courier: resilient service calls over a message broker.
//!
//! A process owns one [`ServiceOrchestrator`] that holds a
//! [`ResilientServiceClient`] per downstream destination. Every call goes
//! through a per-operation circuit breaker, a per-attempt timeout and a
//! bounded retry loop before reaching the [`transport::BrokerTransport`].
//! Health and breaker state are exposed by the status server in [`http`].

// Core subsystems
pub mod client;
pub mod config;
pub mod orchestrator;
pub mod transport;

// Status reporting
pub mod admin;
pub mod discovery;
pub mod health;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use client::{CallError, CallOptions, ResilientServiceClient};
pub use config::CourierConfig;
pub use lifecycle::Shutdown;
pub use orchestrator::ServiceOrchestrator;
