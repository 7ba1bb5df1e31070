//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (orchestrator):
//!     Load config → Validate → Register destinations → Post-connect hooks → Ready
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Trigger flag → Retry loops abort → Cleanup hooks → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then destinations, then the status server
//! - Shutdown flag is latched; nothing new is retried once it is set

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
