//! Host samplers.
//!
//! Each collector owns its rate state and produces one snapshot per pass for
//! a single hub topic. Host access goes through two seams so every collector
//! runs unchanged against the mocks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        CollectorKind                            │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐ ┌─────────┐  │
//! │  │  System  │ │    Vm    │ │  Docker  │ │  Zfs   │ │  Share  │  │
//! │  │ /proc/*  │ │  virsh   │ │  docker  │ │ zpool  │ │  *.cfg  │  │
//! │  │ sensors  │ │  pgrep   │ │          │ │ kstat  │ │ *.ini   │  │
//! │  └────┬─────┘ └────┬─────┘ └────┬─────┘ └───┬────┘ └────┬────┘  │
//! │       └────────────┴─────┬──────┴───────────┴───────────┘       │
//! │                ┌─────────┴──────────┐                           │
//! │                │                    │                           │
//! │         ┌──────▼──────┐     ┌───────▼───────┐                   │
//! │         │  FileSystem │     │ CommandRunner │ (traits)          │
//! │         └──────┬──────┘     └───────┬───────┘                   │
//! └────────────────┼────────────────────┼───────────────────────────┘
//!           ┌──────┴──────┐      ┌──────┴───────┐
//!           │ RealFs      │      │ SystemRunner │
//!           │ MockFs      │      │ MockRunner   │
//!           └─────────────┘      └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use nasmon_core::collector::{Collector, MockFs, MockRunner, VmCollector};
//! use nasmon_core::config::Paths;
//! use nasmon_core::hub::{Hub, topics};
//!
//! let hub = Hub::new(16);
//! let mut sub = hub.subscribe(&[topics::VM_LIST]);
//!
//! let fs = Arc::new(MockFs::storage_server());
//! let runner = Arc::new(MockRunner::storage_server());
//! let mut vms = VmCollector::new(fs, runner, &Paths::default());
//!
//! assert_eq!(vms.collect(&hub).unwrap(), 1);
//! assert!(sub.try_recv().is_some());
//! ```

mod docker;
mod error;
pub mod ini;
pub mod mock;
mod notification;
pub mod procfs;
pub mod sensors;
mod share;
mod system;
pub mod traits;
mod vm;
mod zfs;

use std::sync::Arc;
use std::time::Duration;

pub use docker::{DockerCollector, PsEntry, StatsEntry, image_version, parse_json_lines, parse_ports, uptime_from_status};
pub use error::{CollectError, ExecError};
pub use mock::{MockFs, MockRunner};
pub use notification::NotificationCollector;
pub use share::{ShareCollector, ShareConfig, apply_share_config, parse_share_config, parse_shares_ini};
pub use system::{CPU_SAMPLE_WINDOW, SystemCollector};
pub use traits::{Collector, CommandRunner, FileSystem, RealFs, SystemRunner};
pub use vm::{
    DomInfo, VmCollector, VmCpuCounters, find_counter, parse_cpu_time, parse_domblklist,
    parse_domiflist, parse_dominfo, parse_dommemstat, vm_cpu_percents,
};
pub use zfs::{PoolIoCounters, ZfsCollector, arc_from_kstat, io_rates, parse_zpool_list};

use crate::config::AgentConfig;
use crate::hub::Payload;

/// The fixed set of collectors the agent runs.
pub enum CollectorKind {
    System(SystemCollector),
    Vm(VmCollector),
    Share(ShareCollector),
    Docker(DockerCollector),
    Zfs(ZfsCollector),
    Notification(NotificationCollector),
}

impl CollectorKind {
    /// Builds every collector with a non-zero interval in `config`.
    pub fn from_config(
        config: &AgentConfig,
        fs: Arc<dyn FileSystem>,
        runner: Arc<dyn CommandRunner>,
    ) -> Vec<(CollectorKind, Duration)> {
        let paths = &config.paths;
        let iv = &config.intervals;

        let all = [
            (
                CollectorKind::System(SystemCollector::new(fs.clone(), runner.clone(), paths)),
                iv.system,
            ),
            (
                CollectorKind::Vm(VmCollector::new(fs.clone(), runner.clone(), paths)),
                iv.vm,
            ),
            (
                CollectorKind::Share(ShareCollector::new(fs.clone(), paths)),
                iv.share,
            ),
            (
                CollectorKind::Docker(DockerCollector::new(runner.clone())),
                iv.docker,
            ),
            (
                CollectorKind::Zfs(ZfsCollector::new(fs.clone(), runner, paths)),
                iv.zfs,
            ),
            (
                CollectorKind::Notification(NotificationCollector::new(fs, paths)),
                iv.notification,
            ),
        ];

        all.into_iter()
            .filter(|(_, interval)| !interval.is_zero())
            .collect()
    }

    fn inner(&self) -> &dyn Collector {
        match self {
            CollectorKind::System(c) => c,
            CollectorKind::Vm(c) => c,
            CollectorKind::Share(c) => c,
            CollectorKind::Docker(c) => c,
            CollectorKind::Zfs(c) => c,
            CollectorKind::Notification(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Collector {
        match self {
            CollectorKind::System(c) => c,
            CollectorKind::Vm(c) => c,
            CollectorKind::Share(c) => c,
            CollectorKind::Docker(c) => c,
            CollectorKind::Zfs(c) => c,
            CollectorKind::Notification(c) => c,
        }
    }
}

impl Collector for CollectorKind {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn topic(&self) -> &'static str {
        self.inner().topic()
    }

    fn sample(&mut self) -> Result<Payload, CollectError> {
        self.inner_mut().sample()
    }
}
