//! Service orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! start():
//!     hooks.declare_clients → register(destination, transport)
//!     → hooks.after_connect per destination
//!     → hooks.initialize_resources
//!     → descriptor registered, state = Ready
//!
//! request handler:
//!     → call_named(destination, ...) → ResilientServiceClient::call
//!
//! status endpoints:
//!     → status_report() = health sample + every client's breaker states
//!
//! stop():
//!     shutdown flag → hooks.cleanup_resources → transports closed → deregistered
//! ```
//!
//! # Design Decisions
//! - One orchestrator per process, passed explicitly (no global registry)
//! - Startup failures are fatal and propagated; shutdown failures are logged and skipped
//! - Re-registering a destination replaces the previous client in place

pub mod hooks;
pub mod report;
pub mod service;

pub use hooks::{HookError, LifecycleHooks, NoopHooks};
pub use report::{BreakerReport, LifecycleState, StatusReport};
pub use service::{OrchestratorError, ServiceOrchestrator};
