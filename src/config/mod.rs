//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, env overrides)
//!     → validation.rs (semantic checks)
//!     → CourierConfig (validated, immutable)
//!     → orchestrator builds destinations and the default call policy
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the orchestrator's CallPolicy
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Only the call policy is hot-reloaded; destinations and breakers keep their state

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BreakerConfig, CallsConfig, CourierConfig, DestinationConfig, HealthConfig,
    ObservabilityConfig, ServerConfig, ServiceConfig,
};
