//! Status server subsystem.
//!
//! # Data Flow
//! ```text
//! operator / load balancer probe
//!     → server.rs (axum router, request id, trace and timeout layers)
//!     → handlers.rs (read-only status routes)
//!     → admin (bearer-token routes that mutate breaker state)
//!     → ServiceOrchestrator
//! ```
//!
//! # Design Decisions
//! - Every response is computed from live state; nothing is cached
//! - Read-only routes are unauthenticated, mutating routes always require the admin key

pub mod handlers;
pub mod server;

pub use server::{AppState, StatusServer};
