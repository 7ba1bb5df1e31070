//! Service discovery subsystem.
//!
//! # Responsibilities
//! - Describe the running process (`ServiceDescriptor`)
//! - Keep an in-memory registry of known services and their last health
//!
//! # Design Decisions
//! - The orchestrator registers its own descriptor once started and removes it on stop
//! - Registry health is whatever was last reported; it does not probe remote services

pub mod registry;

pub use registry::{ServiceDescriptor, ServiceInfo, ServiceRegistry};
