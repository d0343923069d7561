//! Virtual machine snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One libvirt domain as published on `vm_list_update`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct VmInfo {
    /// Domain UUID, or the name when the UUID is unavailable.
    pub id: String,
    pub name: String,
    /// `virsh domstate` output, e.g. `running`, `shut off`, `paused`.
    pub state: String,
    pub cpu_count: u32,

    /// Guest CPU time share normalised by vCPU count, 0..=100.
    pub guest_cpu_percent: f64,
    /// CPU share of the QEMU process on the host, 0..=100.
    pub host_cpu_percent: f64,

    pub memory_allocated_bytes: u64,
    pub memory_used_bytes: u64,
    /// `"1.50 GB / 4.00 GB"` or `"0 / 0"`.
    pub memory_display: String,

    /// Cumulative bytes across all block devices.
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
    /// Cumulative bytes across all interfaces.
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,

    pub autostart: bool,
    pub persistent: bool,
    pub timestamp: DateTime<Utc>,
}

impl VmInfo {
    pub fn is_running(&self) -> bool {
        self.state.to_ascii_lowercase().contains("running")
    }
}
