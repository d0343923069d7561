//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions that parse the content of various `/proc` files
//! into structured data. They are designed to be easily testable with string inputs.

use std::collections::HashMap;

use thiserror::Error;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Parses `/proc/uptime` and returns whole seconds since boot.
pub fn parse_uptime(content: &str) -> Result<u64, ParseError> {
    let first = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?;
    let secs: f64 = first
        .parse()
        .map_err(|_| ParseError::new(format!("invalid uptime: {first}")))?;
    Ok(secs.max(0.0) as u64)
}

/// Aggregate CPU times from the `cpu ` line of `/proc/stat` (clock ticks).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        [
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
        ]
        .into_iter()
        .fold(self.user, u64::saturating_add)
    }

    /// Idle time including I/O wait.
    pub fn idle_all(&self) -> u64 {
        self.idle.saturating_add(self.iowait)
    }
}

/// Parses the aggregate `cpu ` line of `/proc/stat`.
///
/// Per-CPU lines (`cpu0`, `cpu1`, ...) are ignored.
pub fn parse_cpu_times(content: &str) -> Result<CpuTimes, ParseError> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| ParseError::new("cpu line not found in /proc/stat"))?;

    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|s| s.parse().unwrap_or(0))
        .collect();
    if values.len() < 8 {
        return Err(ParseError::new("invalid cpu stat format"));
    }

    Ok(CpuTimes {
        user: values[0],
        nice: values[1],
        system: values[2],
        idle: values[3],
        iowait: values[4],
        irq: values[5],
        softirq: values[6],
        steal: values[7],
    })
}

/// Memory counters from `/proc/meminfo`, converted to bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total: u64,
    pub free: u64,
    pub buffers: u64,
    pub cached: u64,
}

impl MemInfo {
    /// total - free - buffers - cached, never below zero.
    pub fn used(&self) -> u64 {
        self.total
            .saturating_sub(self.free)
            .saturating_sub(self.buffers)
            .saturating_sub(self.cached)
    }

    /// free + buffers + cached.
    pub fn available(&self) -> u64 {
        self.free
            .saturating_add(self.buffers)
            .saturating_add(self.cached)
    }

    pub fn usage_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used() as f64 / self.total as f64 * 100.0
    }
}

/// Parses `/proc/meminfo` content.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, ParseError> {
    let mut info = MemInfo::default();
    let mut seen_total = false;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        // Values that do not fit in u64 bytes are skipped like unparsable ones.
        let Some(bytes) = value.parse::<u64>().ok().and_then(|kb| kb.checked_mul(1024)) else {
            continue;
        };

        match key.trim_end_matches(':') {
            "MemTotal" => {
                info.total = bytes;
                seen_total = true;
            }
            "MemFree" => info.free = bytes,
            "Buffers" => info.buffers = bytes,
            "Cached" => info.cached = bytes,
            _ => {}
        }
    }

    if !seen_total {
        return Err(ParseError::new("MemTotal not found in /proc/meminfo"));
    }
    Ok(info)
}

/// Parses `/proc/[pid]/stat` and returns utime + stime in clock ticks.
///
/// The comm field can contain spaces and parentheses, so fields are counted
/// from the last `)`.
pub fn parse_pid_cpu_ticks(content: &str) -> Result<u64, ParseError> {
    let content = content.trim();
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    // Fields after comm start at field 3 (state); utime/stime are fields 14/15.
    let rest: Vec<&str> = content[close_paren + 1..].split_whitespace().collect();
    if rest.len() < 13 {
        return Err(ParseError::new("unexpected /proc/[pid]/stat format"));
    }

    let utime: u64 = rest[11]
        .parse()
        .map_err(|_| ParseError::new("failed to parse utime"))?;
    let stime: u64 = rest[12]
        .parse()
        .map_err(|_| ParseError::new("failed to parse stime"))?;
    Ok(utime.saturating_add(stime))
}

/// Parses a named kstat file such as `/proc/spl/kstat/zfs/arcstats`.
///
/// Format: a kstat header line, a `name type data` line, then one
/// `name type value` row per counter. Rows with a non-integer value are skipped.
pub fn parse_kstat(content: &str) -> HashMap<String, u64> {
    let mut values = HashMap::new();

    for line in content.lines().skip(2) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }
        if let Ok(v) = parts[2].parse::<u64>() {
            values.insert(parts[0].to_string(), v);
        }
    }

    values
}

/// Parses an I/O kstat such as `/proc/spl/kstat/zfs/<pool>/io`.
///
/// Format: a kstat header line, a line of column names, then one line of values.
pub fn parse_kstat_io(content: &str) -> Result<HashMap<String, u64>, ParseError> {
    let mut lines = content.lines().skip(1).filter(|l| !l.trim().is_empty());
    let names = lines
        .next()
        .ok_or_else(|| ParseError::new("missing kstat io header"))?;
    let values = lines
        .next()
        .ok_or_else(|| ParseError::new("missing kstat io values"))?;

    let map: HashMap<String, u64> = names
        .split_whitespace()
        .zip(values.split_whitespace())
        .filter_map(|(k, v)| v.parse().ok().map(|v| (k.to_string(), v)))
        .collect();

    if map.is_empty() {
        return Err(ParseError::new("no kstat io counters"));
    }
    Ok(map)
}
