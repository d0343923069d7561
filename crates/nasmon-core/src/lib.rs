//! nasmon-core: shared library for the nasmon host-monitoring agent.
//!
//! Provides:
//! - `collector`: samplers for system, VMs, shares, containers, ZFS and notifications
//! - `hub`: topic-keyed publish/subscribe bus the collectors publish to
//! - `rates`: rate-state cache turning cumulative counters into percentages and rates
//! - `scheduler`: one task per collector with per-pass fault isolation
//! - `notification`: notification id validator and the on-disk notification store
//! - `models`: serializable snapshot types carried on the bus
//! - `config`: agent configuration with production defaults
//! - `fmt`: display strings and human-size parsing

pub mod collector;
pub mod config;
pub mod fmt;
pub mod hub;
pub mod models;
pub mod notification;
pub mod rates;
pub mod scheduler;
