//! ZFS pool, ARC and I/O snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One pool row from `zpool list -Hp`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ZfsPool {
    pub name: String,
    /// `ONLINE`, `DEGRADED`, `FAULTED`, `OFFLINE`, `UNAVAIL`, `REMOVED`.
    pub health: String,
    pub size_bytes: u64,
    pub allocated_bytes: u64,
    pub free_bytes: u64,
    pub fragmentation_percent: f64,
    pub capacity_percent: f64,
    /// 1.0 means no deduplication.
    pub dedup_ratio: f64,
}

/// ARC counters from `/proc/spl/kstat/zfs/arcstats`.
///
/// Hit ratios are recomputed from `hits`/`misses` every cycle.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ZfsArcStats {
    pub size_bytes: u64,
    pub target_size_bytes: u64,
    pub min_size_bytes: u64,
    pub max_size_bytes: u64,

    pub hit_ratio_percent: f64,
    pub mru_hit_ratio_percent: f64,
    pub mfu_hit_ratio_percent: f64,

    pub hits: u64,
    pub misses: u64,

    pub l2_size_bytes: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
}

/// Per-pool throughput derived from `/proc/spl/kstat/zfs/<pool>/io`.
///
/// All values are per second. The first sample of a pool has no baseline and
/// reports zeros.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ZfsIoStats {
    pub pool_name: String,
    pub read_ops_per_sec: f64,
    pub write_ops_per_sec: f64,
    pub read_bytes_per_sec: f64,
    pub write_bytes_per_sec: f64,
}

/// Payload of `zfs_pools_update`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ZfsSnapshot {
    pub pools: Vec<ZfsPool>,
    /// `None` when the ARC kstat file is missing.
    pub arc: Option<ZfsArcStats>,
    pub io: Vec<ZfsIoStats>,
    pub timestamp: DateTime<Utc>,
}
