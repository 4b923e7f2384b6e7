//! Host and process metrics backed by `sysinfo`.

use super::traits::{LeaseGuard, Snapshot, SourceLease, TelemetryHandle, TelemetrySource};
use crate::error::CollectorError;
use sysinfo::{Components, Pid, ProcessesToUpdate, System};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Samples CPU, memory, load and (optionally) temperatures of the local
/// machine, plus CPU and RSS of one monitored process when a pid is given.
#[derive(Debug, Clone)]
pub struct SystemSource {
    pid: Option<u32>,
    include_temperatures: bool,
    lease: SourceLease,
}

impl SystemSource {
    pub fn new() -> Self {
        Self {
            pid: None,
            include_temperatures: true,
            lease: SourceLease::new(),
        }
    }

    /// Also report `proc_cpu` and `proc_rss(GB)` for this process.
    pub fn with_process(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_temperatures(mut self, enabled: bool) -> Self {
        self.include_temperatures = enabled;
        self
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySource for SystemSource {
    fn name(&self) -> &str {
        "system"
    }

    fn open(&self) -> Result<Box<dyn TelemetryHandle>, CollectorError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(CollectorError::unavailable(
                "sysinfo does not support this platform",
            ));
        }

        let lease = self
            .lease
            .try_acquire()
            .ok_or_else(|| CollectorError::unavailable("system source already has an open handle"))?;

        let mut system = System::new();
        // First CPU reading is relative to this refresh.
        system.refresh_cpu_usage();
        system.refresh_memory();

        let pid = self.pid.map(Pid::from_u32);
        if let Some(pid) = pid {
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
            if system.process(pid).is_none() {
                return Err(CollectorError::unavailable(format!(
                    "process {pid} is not running"
                )));
            }
        }

        let components = self
            .include_temperatures
            .then(Components::new_with_refreshed_list);

        tracing::debug!(cpus = system.cpus().len(), pid = ?self.pid, "opened system telemetry handle");

        Ok(Box::new(SystemHandle {
            system,
            components,
            pid,
            _lease: lease,
        }))
    }
}

struct SystemHandle {
    system: System,
    components: Option<Components>,
    pid: Option<Pid>,
    _lease: LeaseGuard,
}

impl TelemetryHandle for SystemHandle {
    fn snapshot(&mut self) -> Result<Snapshot, CollectorError> {
        let mut metrics = Snapshot::new();

        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        for (i, cpu) in self.system.cpus().iter().enumerate() {
            metrics.insert(format!("CPU{}", i + 1), cpu.cpu_usage().into());
        }

        let total = self.system.total_memory();
        let used = self.system.used_memory();
        if total > 0 {
            metrics.insert("RAM".into(), (used as f64 / total as f64).into());
        }
        metrics.insert("ram_used(total)".into(), (used as f64 / GIB).into());
        metrics.insert("ram_total".into(), (total as f64 / GIB).into());

        let swap_total = self.system.total_swap();
        if swap_total > 0 {
            let swap_used = self.system.used_swap();
            metrics.insert("SWAP".into(), (swap_used as f64 / swap_total as f64).into());
        }

        let load = System::load_average();
        metrics.insert("load_1m".into(), load.one.into());
        metrics.insert("load_5m".into(), load.five.into());
        metrics.insert("load_15m".into(), load.fifteen.into());
        metrics.insert("uptime".into(), System::uptime().into());

        if let Some(components) = self.components.as_mut() {
            components.refresh();
            for component in components.iter() {
                let celsius = component.temperature();
                if celsius.is_finite() {
                    metrics.insert(format!("Temp {}", component.label()), celsius.into());
                }
            }
        }

        if let Some(pid) = self.pid {
            self.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
            let process = self
                .system
                .process(pid)
                .ok_or_else(|| CollectorError::fatal(format!("monitored process {pid} exited")))?;
            metrics.insert("proc_cpu".into(), process.cpu_usage().into());
            metrics.insert("proc_rss(GB)".into(), (process.memory() as f64 / GIB).into());
        }

        Ok(metrics)
    }
}
