//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health or status report
//!     → snapshot.rs (HealthSnapshotProvider::sample)
//!     → probe.rs (this process's resident memory and CPU share)
//!     → classify against thresholds (healthy / degraded / unhealthy)
//! ```
//!
//! # Design Decisions
//! - Recomputed on every request; never cached or persisted
//! - A failed measurement reports unhealthy instead of erroring

pub mod probe;
pub mod snapshot;

pub use probe::{ProbeError, ResourceProbe, ResourceUsage, SystemProbe};
pub use snapshot::{classify, HealthSnapshot, HealthSnapshotProvider, HealthStatus};
