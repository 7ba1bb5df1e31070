//! Process resource measurement.

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};
use thiserror::Error;

/// Raw resource figures from one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    pub memory_used: u64,
    pub memory_total: u64,
    /// Approximate CPU load of this process, 0-100.
    pub cpu_percent: f64,
}

impl ResourceUsage {
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total == 0 {
            return 0.0;
        }
        self.memory_used as f64 / self.memory_total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("memory statistics unavailable")]
    MemoryUnavailable,

    #[error("current process not found")]
    ProcessUnavailable,

    #[error("measurement failed: {0}")]
    Other(String),
}

/// Source of resource figures.
pub trait ResourceProbe: Send + Sync {
    fn measure(&self) -> Result<ResourceUsage, ProbeError>;
}

/// Probe for the current process, backed by the operating system's counters.
///
/// Memory is this process's resident set against the host's total memory.
/// CPU is this process's usage since the previous refresh, divided by the
/// number of CPUs, so the first sample after start-up reads close to zero.
pub struct SystemProbe {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl SystemProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = %e, "Current process id unavailable");
                None
            }
        };

        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_usage();
        if let Some(pid) = pid {
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        }
        Self {
            pid,
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SystemProbe {
    fn measure(&self) -> Result<ResourceUsage, ProbeError> {
        let pid = self.pid.ok_or(ProbeError::ProcessUnavailable)?;

        let mut system = self.system.lock();
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let memory_total = system.total_memory();
        if memory_total == 0 {
            return Err(ProbeError::MemoryUnavailable);
        }

        let process = system.process(pid).ok_or(ProbeError::ProcessUnavailable)?;
        let cpus = system.cpus().len().max(1) as f64;
        let cpu = process.cpu_usage() as f64 / cpus;

        Ok(ResourceUsage {
            memory_used: process.memory(),
            memory_total,
            cpu_percent: if cpu.is_finite() { cpu.clamp(0.0, 100.0) } else { 0.0 },
        })
    }
}
