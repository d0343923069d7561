//! Agent configuration.
//!
//! Built once at start-up (the daemon maps CLI flags and `NASMON_*` variables
//! onto it) and passed by reference to everything that needs it.

use std::path::PathBuf;
use std::time::Duration;

use crate::hub::DEFAULT_QUEUE_CAPACITY;

/// Collection interval per collector. A zero interval disables the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intervals {
    pub system: Duration,
    pub vm: Duration,
    pub share: Duration,
    pub docker: Duration,
    pub zfs: Duration,
    pub notification: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            system: Duration::from_secs(5),
            vm: Duration::from_secs(10),
            share: Duration::from_secs(60),
            docker: Duration::from_secs(10),
            zfs: Duration::from_secs(30),
            notification: Duration::from_secs(15),
        }
    }
}

/// Filesystem locations read by the collectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Mount point of procfs.
    pub proc_root: PathBuf,
    /// Mount point of sysfs (hwmon fallback).
    pub sys_root: PathBuf,
    /// Share usage ini maintained by the storage manager.
    pub shares_ini: PathBuf,
    /// Directory holding one `<share>.cfg` per share.
    pub share_config_dir: PathBuf,
    /// Notification store base; contains `unread/` and `archive/`.
    pub notifications_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
            shares_ini: PathBuf::from("/var/local/emhttp/shares.ini"),
            share_config_dir: PathBuf::from("/boot/config/shares"),
            notifications_dir: PathBuf::from("/tmp/notifications"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub intervals: Intervals,
    pub paths: Paths,
    /// Queue length per subscriber and topic on the hub.
    pub hub_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            intervals: Intervals::default(),
            paths: Paths::default(),
            hub_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
