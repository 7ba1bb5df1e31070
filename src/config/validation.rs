//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempts >= 1, ordered thresholds)
//! - Detect duplicate destinations and unparseable addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: CourierConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::CourierConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }

    if config.calls.timeout_ms == 0 {
        errors.push(ValidationError::new("calls.timeout_ms", "must be greater than 0"));
    }
    if config.calls.max_attempts == 0 {
        errors.push(ValidationError::new("calls.max_attempts", "must be at least 1"));
    }
    if config.calls.max_delay_ms < config.calls.base_delay_ms {
        errors.push(ValidationError::new(
            "calls.max_delay_ms",
            "must not be smaller than calls.base_delay_ms",
        ));
    }

    if config.breaker.threshold == 0 {
        errors.push(ValidationError::new("breaker.threshold", "must be at least 1"));
    }
    if config.breaker.cooldown_ms == 0 {
        errors.push(ValidationError::new("breaker.cooldown_ms", "must be greater than 0"));
    }

    let health = &config.health;
    if !(0.0..=100.0).contains(&health.unhealthy_percent) {
        errors.push(ValidationError::new("health.unhealthy_percent", "must be within 0..=100"));
    }
    if health.degraded_percent >= health.unhealthy_percent {
        errors.push(ValidationError::new(
            "health.degraded_percent",
            "must be lower than health.unhealthy_percent",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    let mut seen = HashSet::new();
    for (i, dest) in config.destinations.iter().enumerate() {
        if dest.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("destinations[{i}].name"), "must not be empty"));
        } else if !seen.insert(dest.name.as_str()) {
            errors.push(ValidationError::new(
                format!("destinations[{i}].name"),
                format!("duplicate destination '{}'", dest.name),
            ));
        }
        if dest.timeout_ms == Some(0) {
            errors.push(ValidationError::new(
                format!("destinations[{i}].timeout_ms"),
                "must be greater than 0",
            ));
        }
        if dest.max_attempts == Some(0) {
            errors.push(ValidationError::new(
                format!("destinations[{i}].max_attempts"),
                "must be at least 1",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
