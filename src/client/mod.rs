//! Service-call subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → ResilientServiceClient::send / emit (operation, payload, CallOptions)
//!     → CallOptions resolved over destination overrides and the default CallPolicy
//!     → resilience (breaker gate, timeout, retry with backoff)
//!     → BrokerTransport
//! ```
//!
//! # Design Decisions
//! - Four failure classes reach callers: circuit open, timeout, transport, remote application
//! - Only circuit open is never retried here; callers may retry it at a higher level
//! - The default policy is shared through `ArcSwap` so config reloads apply to the next call

pub mod error;
pub mod options;
pub mod service_client;

pub use error::CallError;
pub use options::{CallOptions, CallPolicy};
pub use service_client::{CallKind, ResilientServiceClient};
