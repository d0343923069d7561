//! Host-level snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One fan reading.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct FanInfo {
    /// `<chip>_<feature>` from `sensors -u`, or the hwmon label.
    pub name: String,
    pub rpm: u32,
}

/// One temperature reading in degrees Celsius.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct TemperatureInfo {
    pub name: String,
    pub celsius: f64,
}

/// Host snapshot published on `system_update`.
///
/// Fields that could not be read are left at zero or empty.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SystemInfo {
    pub hostname: String,

    /// Seconds since boot.
    /// Source: `/proc/uptime` field 1 (integer part)
    pub uptime_secs: u64,

    /// Busy share of all CPU time over a short sampling window, 0..=100.
    /// Source: two reads of the aggregate `cpu ` line in `/proc/stat`
    pub cpu_usage_percent: f64,

    /// Hottest CPU/core/package sensor (°C), 0 when none matched.
    pub cpu_temp_celsius: f64,

    /// Motherboard sensor (°C), 0 when none matched.
    pub motherboard_temp_celsius: f64,

    /// Bytes: total - free - buffers - cached.
    /// Source: `/proc/meminfo`
    pub ram_used_bytes: u64,
    pub ram_total_bytes: u64,
    /// Bytes: free + buffers + cached.
    pub ram_free_bytes: u64,
    pub ram_usage_percent: f64,

    /// All temperature sensors, sorted by name.
    pub temperatures: Vec<TemperatureInfo>,

    /// All fans, sorted by name.
    pub fans: Vec<FanInfo>,

    pub timestamp: DateTime<Utc>,
}
