//! Snapshot types published on the hub.
//!
//! One module per subsystem:
//!
//! - `system`: host CPU, memory, temperatures, fans (`system_update`)
//! - `vm`: libvirt domains (`vm_list_update`)
//! - `share`: user shares (`share_list_update`)
//! - `docker`: containers (`container_list_update`)
//! - `zfs`: pools, ARC and per-pool I/O (`zfs_pools_update`)
//! - `notification`: notification list with overview counts (`notifications_update`)
//!
//! Every type is `Serialize + Deserialize` so consumers can forward a payload
//! as JSON without knowing its Rust type. Percentages are always derived from
//! raw counters in the collector and never carried between samples.

mod docker;
mod notification;
mod share;
mod system;
mod vm;
mod zfs;

pub use docker::*;
pub use notification::*;
pub use share::*;
pub use system::*;
pub use vm::*;
pub use zfs::*;
