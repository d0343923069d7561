//! User shares: usage from the shares ini, settings from per-share cfg files.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::collector::error::CollectError;
use crate::collector::ini;
use crate::collector::traits::{Collector, FileSystem};
use crate::config::Paths;
use crate::hub::{Payload, topics};
use crate::models::{ShareInfo, ShareStorage};

/// Parses the shares ini into shares with usage fields filled in.
///
/// Malformed numbers are skipped. A missing `size` falls back to used + free.
pub fn parse_shares_ini(content: &str, now: DateTime<Utc>) -> Vec<ShareInfo> {
    ini::parse_sections(content)
        .into_iter()
        .map(|section| {
            let number = |key: &str| section.values.get(key).and_then(|v| v.parse::<u64>().ok());

            let mut share = ShareInfo {
                name: section
                    .values
                    .get("name")
                    .cloned()
                    .unwrap_or(section.name.clone()),
                used_bytes: number("used").unwrap_or(0),
                free_bytes: number("free").unwrap_or(0),
                total_bytes: number("size").unwrap_or(0),
                timestamp: now,
                ..Default::default()
            };

            if share.total_bytes == 0 {
                share.total_bytes = share.used_bytes.saturating_add(share.free_bytes);
            }
            if share.total_bytes > 0 {
                share.usage_percent = share.used_bytes as f64 / share.total_bytes as f64 * 100.0;
            }
            share
        })
        .collect()
}

/// Settings from `<share>.cfg`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareConfig {
    pub comment: String,
    pub use_cache: String,
    pub export: String,
    pub security: String,
}

pub fn parse_share_config(content: &str) -> ShareConfig {
    let mut kv = ini::parse_key_values(content);
    let mut take = |key: &str| kv.remove(key).unwrap_or_default();
    ShareConfig {
        comment: take("shareComment"),
        use_cache: take("shareUseCache"),
        export: take("shareExport"),
        security: take("shareSecurity"),
    }
}

/// SMB is on when a security mode is set or the export flag says so.
pub fn is_smb_exported(export: &str, security: &str) -> bool {
    matches!(security, "public" | "private" | "secure")
        || export.contains("smb")
        || export.contains("-e")
}

pub fn is_nfs_exported(export: &str) -> bool {
    export.contains("nfs") || export.contains("-n")
}

/// Copies cfg settings onto `share`.
pub fn apply_share_config(share: &mut ShareInfo, cfg: ShareConfig) {
    share.storage = ShareStorage::from_use_cache(&cfg.use_cache);
    share.smb_export = is_smb_exported(&cfg.export, &cfg.security);
    share.nfs_export = is_nfs_exported(&cfg.export);
    share.comment = cfg.comment;
    share.use_cache = cfg.use_cache;
    share.security = cfg.security;
}

pub struct ShareCollector {
    fs: Arc<dyn FileSystem>,
    shares_ini: PathBuf,
    config_dir: PathBuf,
}

impl ShareCollector {
    pub fn new(fs: Arc<dyn FileSystem>, paths: &Paths) -> Self {
        Self {
            fs,
            shares_ini: paths.shares_ini.clone(),
            config_dir: paths.share_config_dir.clone(),
        }
    }

    fn config_path(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return None;
        }
        Some(self.config_dir.join(format!("{name}.cfg")))
    }

    fn load_config(&self, name: &str) -> Option<ShareConfig> {
        let path = self.config_path(name)?;
        match self.fs.read_to_string(&path) {
            Ok(content) => Some(parse_share_config(&content)),
            Err(e) => {
                debug!(collector = "share", share = name, path = %path.display(), error = %e, "no share config");
                None
            }
        }
    }

    pub fn collect_shares(&self, now: DateTime<Utc>) -> Result<Vec<ShareInfo>, CollectError> {
        let content = self.fs.read_to_string(&self.shares_ini)?;
        let mut shares = parse_shares_ini(&content, now);

        for share in &mut shares {
            match self.load_config(&share.name) {
                Some(cfg) => apply_share_config(share, cfg),
                None => share.storage = ShareStorage::Unknown,
            }
        }

        Ok(shares)
    }
}

impl Collector for ShareCollector {
    fn name(&self) -> &'static str {
        "share"
    }

    fn topic(&self) -> &'static str {
        topics::SHARE_LIST
    }

    fn sample(&mut self) -> Result<Payload, CollectError> {
        let shares = self.collect_shares(Utc::now())?;
        debug!(collector = "share", count = shares.len(), "collected shares");
        Ok(Payload::new(shares))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_parse_shares_ini() {
        let content = "\
[shareName=\"appdata\"]
name=\"appdata\"
size=\"0\"
free=\"600\"
used=\"400\"
[shareName=\"media\"]
name=\"media\"
size=\"2000\"
free=\"bogus\"
used=\"500\"
";
        let shares = parse_shares_ini(content, Utc::now());
        assert_eq!(shares.len(), 2);

        assert_eq!(shares[0].name, "appdata");
        assert_eq!(shares[0].total_bytes, 1000);
        assert!((shares[0].usage_percent - 40.0).abs() < 1e-9);

        assert_eq!(shares[1].free_bytes, 0);
        assert_eq!(shares[1].total_bytes, 2000);
        assert!((shares[1].usage_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_fallback_saturates() {
        let content = "[shareName=\"big\"]\nused=\"18446744073709551615\"\nfree=\"10\"\n";
        let shares = parse_shares_ini(content, Utc::now());
        assert_eq!(shares[0].total_bytes, u64::MAX);
        assert!((shares[0].usage_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_header_name_used_without_name_key() {
        let shares = parse_shares_ini("[shareName=\"isos\"]\nused=\"1\"\n", Utc::now());
        assert_eq!(shares[0].name, "isos");
    }

    #[test]
    fn test_storage_and_exports() {
        assert_eq!(ShareStorage::from_use_cache("no"), ShareStorage::Array);
        assert_eq!(ShareStorage::from_use_cache("only"), ShareStorage::Cache);
        assert_eq!(ShareStorage::from_use_cache("prefer"), ShareStorage::CacheAndArray);
        assert_eq!(ShareStorage::from_use_cache("yes"), ShareStorage::CacheAndArray);
        assert_eq!(ShareStorage::from_use_cache(""), ShareStorage::Unknown);

        assert!(is_smb_exported("", "public"));
        assert!(is_smb_exported("-e", ""));
        assert!(!is_smb_exported("", ""));
        assert!(is_nfs_exported("-n"));
        assert!(!is_nfs_exported("-e"));
    }

    #[test]
    fn test_collect_shares_enriched() {
        let fs = Arc::new(MockFs::storage_server());
        let c = ShareCollector::new(fs, &Paths::default());
        let shares = c.collect_shares(Utc::now()).unwrap();

        let appdata = shares.iter().find(|s| s.name == "appdata").unwrap();
        assert_eq!(appdata.storage, ShareStorage::Cache);
        assert_eq!(appdata.comment, "Application data");
        assert!(appdata.smb_export);
        assert!(!appdata.nfs_export);

        let media = shares.iter().find(|s| s.name == "media").unwrap();
        assert_eq!(media.storage, ShareStorage::CacheAndArray);
        assert!(media.nfs_export);

        let isos = shares.iter().find(|s| s.name == "isos").unwrap();
        assert_eq!(isos.storage, ShareStorage::Unknown);
        assert!(!isos.smb_export);
    }

    #[test]
    fn test_missing_ini_is_error() {
        let mut c = ShareCollector::new(Arc::new(MockFs::new()), &Paths::default());
        assert!(matches!(c.sample(), Err(CollectError::Io(_))));
    }

    #[test]
    fn test_config_path_rejects_traversal() {
        let c = ShareCollector::new(Arc::new(MockFs::new()), &Paths::default());
        assert!(c.config_path("../etc/passwd").is_none());
        assert!(c.config_path("a/b").is_none());
        assert_eq!(
            c.config_path("media").unwrap(),
            PathBuf::from("/boot/config/shares/media.cfg")
        );
    }

    #[test]
    fn test_serialized_storage() {
        let share = ShareInfo {
            storage: ShareStorage::CacheAndArray,
            ..Default::default()
        };
        let json = serde_json::to_value(&share).unwrap();
        assert_eq!(json["storage"], "cache+array");
    }
}
