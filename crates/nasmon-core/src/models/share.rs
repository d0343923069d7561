//! User share snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a share's data lives, derived from its `shareUseCache` setting.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ShareStorage {
    Array,
    Cache,
    #[serde(rename = "cache+array")]
    CacheAndArray,
    #[default]
    Unknown,
}

impl ShareStorage {
    /// Maps `shareUseCache` (`no`, `only`, `yes`, `prefer`) to a storage location.
    pub fn from_use_cache(use_cache: &str) -> Self {
        match use_cache {
            "no" => ShareStorage::Array,
            "only" => ShareStorage::Cache,
            "yes" | "prefer" => ShareStorage::CacheAndArray,
            _ => ShareStorage::Unknown,
        }
    }
}

/// One user share as published on `share_list_update`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ShareInfo {
    pub name: String,
    pub used_bytes: u64,
    pub free_bytes: u64,
    /// Reported size, or used + free when the size is missing.
    pub total_bytes: u64,
    pub usage_percent: f64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    pub smb_export: bool,
    pub nfs_export: bool,
    pub storage: ShareStorage,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub use_cache: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub security: String,

    pub timestamp: DateTime<Utc>,
}
