//! Host snapshot: hostname, uptime, CPU, memory, temperatures, fans.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use crate::collector::error::CollectError;
use crate::collector::procfs::{self, CpuTimes, MemInfo};
use crate::collector::sensors::{self, SensorReadings};
use crate::collector::traits::{Collector, CommandRunner, FileSystem};
use crate::config::Paths;
use crate::hub::{Payload, topics};
use crate::models::SystemInfo;
use crate::rates::cpu_busy_percent;

/// Window between the two `/proc/stat` reads used for CPU usage.
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(100);

/// Samples host-level state. Stateless between passes.
pub struct SystemCollector {
    fs: Arc<dyn FileSystem>,
    runner: Arc<dyn CommandRunner>,
    proc_root: PathBuf,
    sys_root: PathBuf,
    cpu_window: Duration,
}

impl SystemCollector {
    pub fn new(fs: Arc<dyn FileSystem>, runner: Arc<dyn CommandRunner>, paths: &Paths) -> Self {
        Self {
            fs,
            runner,
            proc_root: paths.proc_root.clone(),
            sys_root: paths.sys_root.clone(),
            cpu_window: CPU_SAMPLE_WINDOW,
        }
    }

    /// Overrides the CPU sampling window.
    pub fn with_cpu_window(mut self, window: Duration) -> Self {
        self.cpu_window = window;
        self
    }

    fn hostname(&self) -> Result<String, CollectError> {
        let name = self
            .fs
            .read_to_string(&self.proc_root.join("sys/kernel/hostname"))?
            .trim()
            .to_string();
        if name.is_empty() {
            return Err(CollectError::Parse("empty hostname".into()));
        }
        Ok(name)
    }

    fn uptime(&self) -> Result<u64, CollectError> {
        let content = self.fs.read_to_string(&self.proc_root.join("uptime"))?;
        Ok(procfs::parse_uptime(&content)?)
    }

    fn cpu_times(&self) -> Result<CpuTimes, CollectError> {
        let content = self.fs.read_to_string(&self.proc_root.join("stat"))?;
        Ok(procfs::parse_cpu_times(&content)?)
    }

    /// Reads `/proc/stat` twice, `cpu_window` apart.
    fn cpu_usage(&self) -> Result<f64, CollectError> {
        let first = self.cpu_times()?;
        if !self.cpu_window.is_zero() {
            std::thread::sleep(self.cpu_window);
        }
        let second = self.cpu_times()?;
        Ok(cpu_busy_percent(&first, &second))
    }

    fn memory(&self) -> Result<MemInfo, CollectError> {
        let content = self.fs.read_to_string(&self.proc_root.join("meminfo"))?;
        Ok(procfs::parse_meminfo(&content)?)
    }

    pub fn collect_info(&self) -> SystemInfo {
        let mut info = SystemInfo {
            hostname: "unknown".to_string(),
            ..Default::default()
        };

        match self.hostname() {
            Ok(name) => info.hostname = name,
            Err(e) => warn!(collector = "system", error = %e, "failed to read hostname"),
        }

        match self.uptime() {
            Ok(secs) => info.uptime_secs = secs,
            Err(e) => warn!(collector = "system", error = %e, "failed to read uptime"),
        }

        match self.cpu_usage() {
            Ok(pct) => info.cpu_usage_percent = pct,
            Err(e) => warn!(collector = "system", error = %e, "failed to read CPU usage"),
        }

        match self.memory() {
            Ok(mem) => {
                info.ram_total_bytes = mem.total;
                info.ram_used_bytes = mem.used();
                info.ram_free_bytes = mem.available();
                info.ram_usage_percent = mem.usage_percent();
            }
            Err(e) => warn!(collector = "system", error = %e, "failed to read memory info"),
        }

        let SensorReadings { temperatures, fans } =
            sensors::read_sensors(self.fs.as_ref(), self.runner.as_ref(), &self.sys_root);
        if temperatures.is_empty() {
            warn!(collector = "system", "no temperature sensors found");
        }
        info.cpu_temp_celsius = sensors::cpu_temperature(&temperatures);
        info.motherboard_temp_celsius = sensors::motherboard_temperature(&temperatures);
        info.temperatures = temperatures;
        info.fans = fans;

        info.timestamp = Utc::now();
        info
    }
}

impl Collector for SystemCollector {
    fn name(&self) -> &'static str {
        "system"
    }

    fn topic(&self) -> &'static str {
        topics::SYSTEM
    }

    fn sample(&mut self) -> Result<Payload, CollectError> {
        Ok(Payload::new(self.collect_info()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, MockRunner};

    fn collector(fs: Arc<MockFs>, runner: Arc<MockRunner>) -> SystemCollector {
        SystemCollector::new(fs, runner, &Paths::default()).with_cpu_window(Duration::ZERO)
    }

    #[test]
    fn test_collect_typical_host() {
        let fs = Arc::new(MockFs::storage_server());
        let runner = Arc::new(MockRunner::storage_server());

        let info = collector(fs, runner).collect_info();

        assert_eq!(info.hostname, "tower");
        assert_eq!(info.uptime_secs, 12345);
        assert_eq!(info.ram_total_bytes, 16384000 * 1024);
        assert_eq!(info.ram_used_bytes, (16384000 - 8192000 - 512000 - 2048000) * 1024);
        assert_eq!(info.ram_free_bytes, (8192000 + 512000 + 2048000) * 1024);
        assert!((info.ram_usage_percent - 34.375).abs() < 1e-9);
        // same /proc/stat twice: no elapsed CPU time
        assert_eq!(info.cpu_usage_percent, 0.0);
        assert_eq!(info.cpu_temp_celsius, 51.0);
        assert_eq!(info.motherboard_temp_celsius, 36.5);
        assert_eq!(info.fans.len(), 2);
    }

    #[test]
    fn test_missing_files_leave_fields_empty() {
        let info = collector(Arc::new(MockFs::new()), Arc::new(MockRunner::new())).collect_info();

        assert_eq!(info.hostname, "unknown");
        assert_eq!(info.uptime_secs, 0);
        assert_eq!(info.ram_total_bytes, 0);
        assert_eq!(info.ram_usage_percent, 0.0);
        assert!(info.temperatures.is_empty());
        assert!(info.fans.is_empty());
    }

    #[test]
    fn test_sample_always_produces_payload() {
        let mut c = collector(Arc::new(MockFs::new()), Arc::new(MockRunner::new()));
        let payload = c.sample().unwrap();
        assert!(payload.downcast_ref::<SystemInfo>().is_some());
        assert_eq!(c.topic(), "system_update");
    }
}
