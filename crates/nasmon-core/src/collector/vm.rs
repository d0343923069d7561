//! libvirt domains via `virsh`.
//!
//! Per cycle: list every domain, then query state, identity and allocation for
//! each. Running domains additionally report memory in use, CPU utilisation
//! (guest and host side) and cumulative disk/network bytes.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::collector::error::CollectError;
use crate::collector::procfs;
use crate::collector::traits::{Collector, CommandRunner, FileSystem};
use crate::config::Paths;
use crate::fmt::format_memory_display;
use crate::hub::{Payload, topics};
use crate::models::VmInfo;
use crate::rates::{CounterUnit, RateState, cpu_percent};

const VIRSH: &str = "virsh";

// ---------------------------------------------------------------------------
// Output parsers
// ---------------------------------------------------------------------------

/// Fields of interest from `virsh dominfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomInfo {
    pub cpu_count: u32,
    pub memory_allocated: u64,
    pub autostart: bool,
    pub persistent: bool,
}

/// Parses `virsh dominfo` (`Key:   value` lines). `Max memory` is KiB.
pub fn parse_dominfo(output: &str) -> DomInfo {
    let mut info = DomInfo::default();

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim() {
            "CPU(s)" => {
                if let Ok(n) = value.parse() {
                    info.cpu_count = n;
                }
            }
            "Max memory" => {
                if let Some(bytes) = value
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.parse::<u64>().ok())
                    .and_then(|kib| kib.checked_mul(1024))
                {
                    info.memory_allocated = bytes;
                }
            }
            "Autostart" => info.autostart = value.eq_ignore_ascii_case("enable"),
            "Persistent" => info.persistent = value.eq_ignore_ascii_case("yes"),
            _ => {}
        }
    }

    info
}

/// Finds `key <number>` in whitespace-separated output.
///
/// Matches both `rd_bytes 123` and `vda rd_bytes 123` layouts.
pub fn find_counter(output: &str, key: &str) -> Option<u64> {
    output.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        words.by_ref().find(|w| *w == key)?;
        words.next()?.parse().ok()
    })
}

/// Memory in use from `virsh dommemstat`: `actual`, else `rss`. KiB → bytes.
///
/// `None` when neither is present or the value overflows as bytes.
pub fn parse_dommemstat(output: &str) -> Option<u64> {
    find_counter(output, "actual")
        .or_else(|| find_counter(output, "rss"))
        .and_then(|kib| kib.checked_mul(1024))
}

/// Cumulative guest CPU time (ns) from `virsh domstats --cpu-total`.
pub fn parse_cpu_time(output: &str) -> Option<u64> {
    output
        .lines()
        .find_map(|l| l.trim().strip_prefix("cpu.time="))
        .and_then(|v| v.trim().parse().ok())
}

/// Device targets from `virsh domblklist`, skipping empty drives.
pub fn parse_domblklist(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [target, source, ..]
                    if *target != "Target" && !target.starts_with('-') && *source != "-" =>
                {
                    Some(target.to_string())
                }
                _ => None,
            }
        })
        .collect()
}

/// Interface names from `virsh domiflist`.
pub fn parse_domiflist(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| *name != "Interface" && !name.starts_with('-'))
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// CPU rates
// ---------------------------------------------------------------------------

/// Cumulative CPU counters of one domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmCpuCounters {
    /// Guest CPU time, nanoseconds.
    pub guest_ns: u64,
    /// utime + stime of the QEMU process, clock ticks. 0 when unknown.
    pub host_ticks: u64,
}

/// Guest and host CPU percent between two readings.
///
/// Guest time is normalised by vCPU count. Host time needs both readings to be
/// known (> 0); otherwise the host percent is 0.
pub fn vm_cpu_percents(
    prev: &VmCpuCounters,
    curr: &VmCpuCounters,
    dt_secs: f64,
    vcpus: u32,
) -> (f64, f64) {
    let guest = cpu_percent(
        prev.guest_ns,
        curr.guest_ns,
        dt_secs,
        CounterUnit::Nanoseconds,
        f64::from(vcpus),
    );
    let host = if prev.host_ticks > 0 && curr.host_ticks > 0 {
        cpu_percent(
            prev.host_ticks,
            curr.host_ticks,
            dt_secs,
            CounterUnit::ClockTicks,
            1.0,
        )
    } else {
        0.0
    };
    (guest, host)
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Source of the wall-clock time stamped on each CPU counter reading.
type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct VmCollector {
    fs: Arc<dyn FileSystem>,
    runner: Arc<dyn CommandRunner>,
    proc_root: PathBuf,
    clock: Clock,
    /// Keyed by domain name; only running domains have an entry.
    rates: RateState<String, VmCpuCounters>,
}

impl VmCollector {
    pub fn new(fs: Arc<dyn FileSystem>, runner: Arc<dyn CommandRunner>, paths: &Paths) -> Self {
        Self {
            fs,
            runner,
            proc_root: paths.proc_root.clone(),
            clock: Arc::new(Utc::now),
            rates: RateState::new(),
        }
    }

    /// Replaces the clock used to time CPU counter readings.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Number of domains with a CPU baseline.
    pub fn tracked(&self) -> usize {
        self.rates.len()
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.rates.contains(name)
    }

    fn virsh(&self, args: &[&str]) -> Result<String, CollectError> {
        Ok(self.runner.output(VIRSH, args)?)
    }

    fn domuuid(&self, name: &str) -> String {
        match self.virsh(&["domuuid", name]) {
            Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
            _ => name.to_string(),
        }
    }

    fn qemu_pid(&self, name: &str) -> Result<u32, CollectError> {
        let pattern = format!("qemu.*guest={name}");
        let out = self.runner.output("pgrep", &["-f", &pattern])?;
        let first = out
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| CollectError::Parse(format!("no QEMU process for {name}")))?;
        first
            .parse()
            .map_err(|_| CollectError::Parse(format!("invalid pid: {first}")))
    }

    fn host_cpu_ticks(&self, name: &str) -> Result<u64, CollectError> {
        let pid = self.qemu_pid(name)?;
        let stat = self
            .fs
            .read_to_string(&self.proc_root.join(pid.to_string()).join("stat"))?;
        Ok(procfs::parse_pid_cpu_ticks(&stat)?)
    }

    fn cpu_usage(&mut self, name: &str, vcpus: u32) -> Result<(f64, f64), CollectError> {
        let out = self.virsh(&["domstats", name, "--cpu-total"])?;
        let read_at = (self.clock)();
        let guest_ns = parse_cpu_time(&out)
            .ok_or_else(|| CollectError::Parse("cpu.time missing from domstats".into()))?;

        let host_ticks = match self.host_cpu_ticks(name) {
            Ok(ticks) => ticks,
            Err(e) => {
                debug!(collector = "vm", vm = name, error = %e, "host CPU time unavailable");
                0
            }
        };

        let current = VmCpuCounters {
            guest_ns,
            host_ticks,
        };
        Ok(match self.rates.observe(name.to_string(), current, read_at) {
            Some((prev, dt)) => vm_cpu_percents(&prev, &current, dt, vcpus),
            None => (0.0, 0.0),
        })
    }

    fn disk_io(&self, name: &str) -> Result<(u64, u64), CollectError> {
        let list = self.virsh(&["domblklist", name])?;
        let (mut read, mut write) = (0u64, 0u64);
        for target in parse_domblklist(&list) {
            let Ok(stats) = self.virsh(&["domblkstat", name, &target]) else {
                continue;
            };
            read = read.saturating_add(find_counter(&stats, "rd_bytes").unwrap_or(0));
            write = write.saturating_add(find_counter(&stats, "wr_bytes").unwrap_or(0));
        }
        Ok((read, write))
    }

    fn network_io(&self, name: &str) -> Result<(u64, u64), CollectError> {
        let list = self.virsh(&["domiflist", name])?;
        let (mut rx, mut tx) = (0u64, 0u64);
        for iface in parse_domiflist(&list) {
            let Ok(stats) = self.virsh(&["domifstat", name, &iface]) else {
                continue;
            };
            rx = rx.saturating_add(find_counter(&stats, "rx_bytes").unwrap_or(0));
            tx = tx.saturating_add(find_counter(&stats, "tx_bytes").unwrap_or(0));
        }
        Ok((rx, tx))
    }

    fn fill_running(&mut self, vm: &mut VmInfo) {
        match self.virsh(&["dommemstat", &vm.name]) {
            Ok(out) => vm.memory_used_bytes = parse_dommemstat(&out).unwrap_or(0),
            Err(e) => debug!(collector = "vm", vm = %vm.name, error = %e, "dommemstat failed"),
        }

        if vm.cpu_count > 0 {
            match self.cpu_usage(&vm.name, vm.cpu_count) {
                Ok((guest, host)) => {
                    vm.guest_cpu_percent = guest;
                    vm.host_cpu_percent = host;
                }
                Err(e) => debug!(collector = "vm", vm = %vm.name, error = %e, "CPU usage unavailable"),
            }
        }

        if let Ok((read, write)) = self.disk_io(&vm.name) {
            vm.disk_read_bytes = read;
            vm.disk_write_bytes = write;
        }
        if let Ok((rx, tx)) = self.network_io(&vm.name) {
            vm.network_rx_bytes = rx;
            vm.network_tx_bytes = tx;
        }
    }

    /// One pass. `now` stamps the snapshots; CPU readings are timed by the
    /// collector's clock as each domain is queried.
    pub fn collect_vms(&mut self, now: DateTime<Utc>) -> Result<Vec<VmInfo>, CollectError> {
        let listing = self.virsh(&["list", "--all", "--name"])?;
        let mut vms = Vec::new();
        let mut listed = HashSet::new();

        for name in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
            listed.insert(name.to_string());

            let state = match self.virsh(&["domstate", name]) {
                Ok(s) => s.trim().to_string(),
                Err(e) => {
                    warn!(collector = "vm", vm = name, error = %e, "failed to get domain state");
                    continue;
                }
            };

            let mut vm = VmInfo {
                id: self.domuuid(name),
                name: name.to_string(),
                state,
                timestamp: now,
                ..Default::default()
            };

            match self.virsh(&["dominfo", name]) {
                Ok(out) => {
                    let info = parse_dominfo(&out);
                    vm.cpu_count = info.cpu_count;
                    vm.memory_allocated_bytes = info.memory_allocated;
                    vm.autostart = info.autostart;
                    vm.persistent = info.persistent;
                }
                Err(e) => debug!(collector = "vm", vm = name, error = %e, "dominfo failed"),
            }

            if vm.is_running() {
                self.fill_running(&mut vm);
            } else {
                self.rates.forget(name);
            }

            vm.memory_display = format_memory_display(vm.memory_used_bytes, vm.memory_allocated_bytes);
            vms.push(vm);
        }

        self.rates.retain(|name| listed.contains(name));
        Ok(vms)
    }
}

impl Collector for VmCollector {
    fn name(&self) -> &'static str {
        "vm"
    }

    fn topic(&self) -> &'static str {
        topics::VM_LIST
    }

    fn sample(&mut self) -> Result<Payload, CollectError> {
        if !self.runner.exists(VIRSH) {
            return Err(CollectError::MissingPrerequisite(VIRSH));
        }
        let vms = self.collect_vms(Utc::now())?;
        debug!(collector = "vm", count = vms.len(), "collected domains");
        Ok(Payload::new(vms))
    }
}
