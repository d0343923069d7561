//! Container snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One published port, parsed from `0.0.0.0:8080->80/tcp`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct PortMapping {
    pub private_port: u16,
    /// 0 when the port is exposed but not published.
    pub public_port: u16,
    #[serde(rename = "type")]
    pub protocol: String,
}

/// One container as published on `container_list_update`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Image tag, `latest` when the image reference has none.
    pub version: String,
    /// `running`, `exited`, `paused`, ...
    pub state: String,
    /// Human status, e.g. `Up 3 hours`.
    pub status: String,
    pub network_mode: String,

    pub cpu_percent: f64,
    pub memory_usage_bytes: u64,
    pub memory_limit_bytes: u64,
    pub memory_display: String,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,

    pub ports: Vec<PortMapping>,
    /// Raw `Ports` column entries.
    pub port_mappings: Vec<String>,
    /// Running time from the status column, empty when not running.
    pub uptime: String,
    pub timestamp: DateTime<Utc>,
}
