//! `.notify` files: one `key=value` per line.
//!
//! ```text
//! timestamp=1731931200
//! event=Parity check
//! subject=Notice [TOWER] - Parity check finished (0 errors)
//! description=Duration: 14 hours, 2 minutes
//! importance=normal
//! link=/Main
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::collector::FileSystem;
use crate::collector::ini::parse_key_values;
use crate::models::{Importance, Notification, NotificationKind};

/// File name suffix of every notification.
pub const NOTIFY_EXTENSION: &str = ".notify";

/// Parses one notification body.
///
/// Returns `None` when `timestamp` is missing or not a unix time in seconds.
pub fn parse_notify_file(id: &str, content: &str, kind: NotificationKind) -> Option<Notification> {
    let mut kv = parse_key_values(content);
    let secs: i64 = kv.get("timestamp")?.trim().parse().ok()?;
    let timestamp = DateTime::<Utc>::from_timestamp(secs, 0)?;
    let mut take = |key: &str| kv.remove(key).unwrap_or_default();

    Some(Notification {
        id: id.to_string(),
        title: take("event"),
        subject: take("subject"),
        description: take("description"),
        importance: Importance::parse(&take("importance")),
        link: take("link"),
        timestamp,
        kind,
    })
}

/// Loads every `.notify` file in `dir`. A missing directory yields nothing.
pub fn load_dir(fs: &dyn FileSystem, dir: &Path, kind: NotificationKind) -> Vec<Notification> {
    let entries = match fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "notification directory unavailable");
            return Vec::new();
        }
    };

    let mut out = Vec::with_capacity(entries.len());
    for path in entries {
        let Some(id) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !id.ends_with(NOTIFY_EXTENSION) {
            continue;
        }
        let parsed = fs
            .read_to_string(&path)
            .ok()
            .and_then(|content| parse_notify_file(id, &content, kind));
        match parsed {
            Some(n) => out.push(n),
            None => debug!(file = %path.display(), "skipping unreadable notification"),
        }
    }
    out
}

/// Loads `unread/` and `archive/` under `base`.
pub fn load_notifications(fs: &dyn FileSystem, base: &Path) -> Vec<Notification> {
    let mut all = Vec::new();
    for kind in [NotificationKind::Unread, NotificationKind::Archive] {
        all.extend(load_dir(fs, &base.join(kind.dir_name()), kind));
    }
    all
}
