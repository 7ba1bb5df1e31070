//! In-memory service registry.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::health::HealthSnapshot;

/// Static identity of a running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub version: String,
    pub host: String,
    pub port: u16,
}

impl From<&ServiceConfig> for ServiceDescriptor {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// A descriptor paired with its latest health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(flatten)]
    pub descriptor: ServiceDescriptor,
    pub health: Option<HealthSnapshot>,
}

/// Known services keyed by name.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, ServiceInfo>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a service.
    pub fn register(&self, info: ServiceInfo) {
        tracing::info!(
            service = %info.descriptor.name,
            host = %info.descriptor.host,
            port = info.descriptor.port,
            "Service registered"
        );
        self.services.insert(info.descriptor.name.clone(), info);
    }

    /// Remove a service. Returns false if it was not registered.
    pub fn deregister(&self, name: &str) -> bool {
        let removed = self.services.remove(name).is_some();
        if removed {
            tracing::info!(service = %name, "Service deregistered");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<ServiceInfo> {
        self.services.get(name).map(|entry| entry.clone())
    }

    /// All services, ordered by name.
    pub fn all(&self) -> Vec<ServiceInfo> {
        let mut all: Vec<_> = self.services.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by(|a, b| a.descriptor.name.cmp(&b.descriptor.name));
        all
    }

    /// Store the latest health for a registered service. Returns false if unknown.
    pub fn update_health(&self, name: &str, health: HealthSnapshot) -> bool {
        match self.services.get_mut(name) {
            Some(mut entry) => {
                tracing::debug!(service = %name, status = ?health.status, "Health updated");
                entry.health = Some(health);
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.services.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
