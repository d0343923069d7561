//! ZFS pools, ARC and per-pool throughput.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::collector::error::CollectError;
use crate::collector::procfs::{self, ParseError};
use crate::collector::traits::{Collector, CommandRunner, FileSystem};
use crate::config::Paths;
use crate::fmt::parse_percent;
use crate::hub::{Payload, topics};
use crate::models::{ZfsArcStats, ZfsIoStats, ZfsPool, ZfsSnapshot};
use crate::rates::{RateState, per_second};

const ZPOOL: &str = "zpool";
const ZPOOL_LIST_ARGS: [&str; 4] = [
    "list",
    "-Hp",
    "-o",
    "name,size,alloc,free,frag,cap,dedup,health",
];

/// Parses tab-separated `zpool list -Hp -o name,size,alloc,free,frag,cap,dedup,health`.
///
/// Rows with fewer than eight columns are skipped; `-` values read as 0.
pub fn parse_zpool_list(output: &str) -> Vec<ZfsPool> {
    output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
            if cols.len() < 8 || cols[0].is_empty() {
                return None;
            }
            let bytes = |s: &str| s.parse::<u64>().unwrap_or(0);
            Some(ZfsPool {
                name: cols[0].to_string(),
                size_bytes: bytes(cols[1]),
                allocated_bytes: bytes(cols[2]),
                free_bytes: bytes(cols[3]),
                fragmentation_percent: parse_percent(cols[4]).unwrap_or(0.0),
                capacity_percent: parse_percent(cols[5]).unwrap_or(0.0),
                dedup_ratio: cols[6].trim_end_matches('x').parse().unwrap_or(1.0),
                health: cols[7].to_string(),
            })
        })
        .collect()
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Builds ARC stats from parsed `arcstats`.
pub fn arc_from_kstat(k: &HashMap<String, u64>) -> ZfsArcStats {
    let get = |key: &str| k.get(key).copied().unwrap_or(0);
    let hits = get("hits");
    let misses = get("misses");

    ZfsArcStats {
        size_bytes: get("size"),
        target_size_bytes: get("c"),
        min_size_bytes: get("c_min"),
        max_size_bytes: get("c_max"),
        hit_ratio_percent: ratio(hits, hits.saturating_add(misses)),
        mru_hit_ratio_percent: ratio(get("mru_hits"), hits),
        mfu_hit_ratio_percent: ratio(get("mfu_hits"), hits),
        hits,
        misses,
        l2_size_bytes: get("l2_size"),
        l2_hits: get("l2_hits"),
        l2_misses: get("l2_misses"),
    }
}

/// Cumulative counters from a pool's `io` kstat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolIoCounters {
    pub nread: u64,
    pub nwritten: u64,
    pub reads: u64,
    pub writes: u64,
}

impl PoolIoCounters {
    pub fn from_kstat(k: &HashMap<String, u64>) -> Result<Self, ParseError> {
        let get = |key: &str| {
            k.get(key)
                .copied()
                .ok_or_else(|| ParseError::new(format!("{key} missing from io kstat")))
        };
        Ok(Self {
            nread: get("nread")?,
            nwritten: get("nwritten")?,
            reads: get("reads")?,
            writes: get("writes")?,
        })
    }
}

/// Per-second throughput between two readings. Counters going backwards give 0.
pub fn io_rates(pool: &str, prev: &PoolIoCounters, curr: &PoolIoCounters, dt_secs: f64) -> ZfsIoStats {
    ZfsIoStats {
        pool_name: pool.to_string(),
        read_ops_per_sec: per_second(prev.reads, curr.reads, dt_secs),
        write_ops_per_sec: per_second(prev.writes, curr.writes, dt_secs),
        read_bytes_per_sec: per_second(prev.nread, curr.nread, dt_secs),
        write_bytes_per_sec: per_second(prev.nwritten, curr.nwritten, dt_secs),
    }
}

pub struct ZfsCollector {
    fs: Arc<dyn FileSystem>,
    runner: Arc<dyn CommandRunner>,
    kstat_dir: PathBuf,
    /// Keyed by pool name.
    rates: RateState<String, PoolIoCounters>,
}

impl ZfsCollector {
    pub fn new(fs: Arc<dyn FileSystem>, runner: Arc<dyn CommandRunner>, paths: &Paths) -> Self {
        Self {
            fs,
            runner,
            kstat_dir: paths.proc_root.join("spl/kstat/zfs"),
            rates: RateState::new(),
        }
    }

    pub fn is_tracked(&self, pool: &str) -> bool {
        self.rates.contains(pool)
    }

    fn arc(&self) -> Option<ZfsArcStats> {
        let path = self.kstat_dir.join("arcstats");
        match self.fs.read_to_string(&path) {
            Ok(content) => Some(arc_from_kstat(&procfs::parse_kstat(&content))),
            Err(e) => {
                debug!(collector = "zfs", error = %e, "arcstats unavailable");
                None
            }
        }
    }

    fn pool_counters(&self, pool: &str) -> Result<PoolIoCounters, CollectError> {
        let content = self.fs.read_to_string(&self.kstat_dir.join(pool).join("io"))?;
        Ok(PoolIoCounters::from_kstat(&procfs::parse_kstat_io(&content)?)?)
    }

    fn io(&mut self, pools: &[ZfsPool], now: DateTime<Utc>) -> Vec<ZfsIoStats> {
        let mut out = Vec::with_capacity(pools.len());

        for pool in pools {
            let current = match self.pool_counters(&pool.name) {
                Ok(c) => c,
                Err(e) => {
                    debug!(collector = "zfs", pool = %pool.name, error = %e, "pool io kstat unavailable");
                    self.rates.forget(pool.name.as_str());
                    continue;
                }
            };
            let stats = match self.rates.observe(pool.name.clone(), current, now) {
                Some((prev, dt)) => io_rates(&pool.name, &prev, &current, dt),
                None => ZfsIoStats {
                    pool_name: pool.name.clone(),
                    ..Default::default()
                },
            };
            out.push(stats);
        }

        let listed: HashSet<&str> = pools.iter().map(|p| p.name.as_str()).collect();
        self.rates.retain(|name| listed.contains(name.as_str()));
        out
    }

    pub fn collect_snapshot(&mut self, now: DateTime<Utc>) -> Result<ZfsSnapshot, CollectError> {
        let listing = self.runner.output(ZPOOL, &ZPOOL_LIST_ARGS)?;
        let pools = parse_zpool_list(&listing);
        let io = self.io(&pools, now);

        Ok(ZfsSnapshot {
            arc: self.arc(),
            pools,
            io,
            timestamp: now,
        })
    }
}

impl Collector for ZfsCollector {
    fn name(&self) -> &'static str {
        "zfs"
    }

    fn topic(&self) -> &'static str {
        topics::ZFS_POOLS
    }

    fn sample(&mut self) -> Result<Payload, CollectError> {
        if !self.runner.exists(ZPOOL) {
            return Err(CollectError::MissingPrerequisite(ZPOOL));
        }
        let snapshot = self.collect_snapshot(Utc::now())?;
        debug!(collector = "zfs", pools = snapshot.pools.len(), "collected pools");
        Ok(Payload::new(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, MockRunner};
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn io_kstat(nread: u64, nwritten: u64, reads: u64, writes: u64) -> String {
        format!(
            "12 3 0x00 1 80 2280987431 18342837543891\n\
             nread    nwritten reads    writes   wtime    wlentime\n\
             {nread} {nwritten} {reads} {writes} 0 0\n"
        )
    }

    #[test]
    fn test_parse_zpool_list() {
        let out = "tank\t1000\t400\t600\t12\t40\t1.00\tONLINE\ncache\t500\t100\t400\t-\t20\t1.50x\tDEGRADED\nshort\t1\n";
        let pools = parse_zpool_list(out);

        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].name, "tank");
        assert_eq!(pools[0].size_bytes, 1000);
        assert_eq!(pools[0].fragmentation_percent, 12.0);
        assert_eq!(pools[0].capacity_percent, 40.0);
        assert_eq!(pools[0].dedup_ratio, 1.0);
        assert_eq!(pools[1].fragmentation_percent, 0.0);
        assert_eq!(pools[1].dedup_ratio, 1.5);
        assert_eq!(pools[1].health, "DEGRADED");
    }

    #[test]
    fn test_arc_hit_ratios() {
        let mut k = HashMap::new();
        k.insert("hits".to_string(), 750);
        k.insert("misses".to_string(), 250);
        k.insert("mru_hits".to_string(), 300);
        k.insert("mfu_hits".to_string(), 450);
        k.insert("size".to_string(), 4096);

        let arc = arc_from_kstat(&k);
        assert_eq!(arc.hit_ratio_percent, 75.0);
        assert_eq!(arc.mru_hit_ratio_percent, 40.0);
        assert_eq!(arc.mfu_hit_ratio_percent, 60.0);
        assert_eq!(arc.size_bytes, 4096);

        assert_eq!(arc_from_kstat(&HashMap::new()).hit_ratio_percent, 0.0);
    }

    #[test]
    fn test_io_rates() {
        let prev = PoolIoCounters { nread: 1000, nwritten: 2000, reads: 10, writes: 20 };
        let curr = PoolIoCounters { nread: 6000, nwritten: 1000, reads: 60, writes: 40 };
        let io = io_rates("tank", &prev, &curr, 5.0);
        assert_eq!(io.read_bytes_per_sec, 1000.0);
        // counter went backwards
        assert_eq!(io.write_bytes_per_sec, 0.0);
        assert_eq!(io.read_ops_per_sec, 10.0);
        assert_eq!(io.write_ops_per_sec, 4.0);
    }

    #[test]
    fn test_collect_snapshot_rates_across_passes() {
        let fs = Arc::new(MockFs::storage_server());
        let runner = Arc::new(MockRunner::storage_server());
        let mut c = ZfsCollector::new(fs.clone(), runner, &Paths::default());

        let first = c.collect_snapshot(t0()).unwrap();
        assert_eq!(first.pools.len(), 1);
        assert_eq!(first.io[0].read_bytes_per_sec, 0.0);
        let arc = first.arc.unwrap();
        assert_eq!(arc.hits, 900);
        assert!((arc.hit_ratio_percent - 90.0).abs() < 1e-9);

        fs.add_file("/proc/spl/kstat/zfs/tank/io", io_kstat(1_048_576 + 10_000, 2_097_152, 110, 200));
        let second = c.collect_snapshot(t0() + Duration::seconds(10)).unwrap();
        assert_eq!(second.io[0].read_bytes_per_sec, 1000.0);
        assert_eq!(second.io[0].read_ops_per_sec, 1.0);
        assert_eq!(second.io[0].write_bytes_per_sec, 0.0);
    }

    #[test]
    fn test_removed_pool_is_forgotten() {
        let fs = Arc::new(MockFs::storage_server());
        let runner = Arc::new(MockRunner::storage_server());
        let mut c = ZfsCollector::new(fs, runner.clone(), &Paths::default());

        c.collect_snapshot(t0()).unwrap();
        assert!(c.is_tracked("tank"));

        runner.set_output("zpool list -Hp -o name,size,alloc,free,frag,cap,dedup,health", "");
        let snap = c.collect_snapshot(t0() + Duration::seconds(10)).unwrap();
        assert!(snap.pools.is_empty());
        assert!(!c.is_tracked("tank"));
    }

    #[test]
    fn test_missing_arcstats() {
        let fs = Arc::new(MockFs::storage_server());
        fs.remove_file("/proc/spl/kstat/zfs/arcstats");
        let mut c = ZfsCollector::new(fs, Arc::new(MockRunner::storage_server()), &Paths::default());
        assert!(c.collect_snapshot(t0()).unwrap().arc.is_none());
    }

    #[test]
    fn test_missing_zpool_is_prerequisite() {
        let mut c = ZfsCollector::new(Arc::new(MockFs::new()), Arc::new(MockRunner::new()), &Paths::default());
        assert!(c.sample().unwrap_err().is_prerequisite());
    }
}
