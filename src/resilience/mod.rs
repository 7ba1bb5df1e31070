//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to destination:
//!     → circuit_breaker.rs (fail fast if the (destination, operation) breaker is open)
//!     → timeouts.rs (bound each attempt)
//!     → On failure: retries.rs (retryable? wait backoff.rs delay, honour shutdown)
//!     → circuit_breaker.rs (record one outcome per attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Failures are counted per attempt, not per logical call
//! - Open breakers are never retried at this layer

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::{Backoff, BackoffStrategy};
pub use circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerState, CircuitStatus};
