//! Id-keyed operations on the notification directories.
//!
//! Layout under `base`:
//!
//! ```text
//! base/
//! ├── unread/   <id>.notify
//! └── archive/  <id>.notify
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::file::{load_notifications, parse_notify_file};
use super::id::{NotificationIdError, validate_notification_id};
use crate::collector::RealFs;
use crate::models::{Notification, NotificationKind, NotificationList};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    InvalidId(#[from] NotificationIdError),
    #[error("notification not found: {0}")]
    NotFound(String),
    #[error("notification {0} has no valid timestamp")]
    Unparseable(String),
    #[error("notification store I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    fn from_io(id: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(id.to_string())
        } else {
            StoreError::Io(err)
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationStore {
    base: PathBuf,
}

impl NotificationStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn dir(&self, kind: NotificationKind) -> PathBuf {
        self.base.join(kind.dir_name())
    }

    /// Path of `id` in `kind`. Only called with validated ids.
    fn path(&self, kind: NotificationKind, id: &str) -> PathBuf {
        self.dir(kind).join(id)
    }

    /// Reads one notification, looking in `unread/` first.
    pub fn read(&self, id: &str) -> Result<Notification, StoreError> {
        validate_notification_id(id)?;

        for kind in [NotificationKind::Unread, NotificationKind::Archive] {
            match fs::read_to_string(self.path(kind, id)) {
                Ok(content) => {
                    return parse_notify_file(id, &content, kind)
                        .ok_or_else(|| StoreError::Unparseable(id.to_string()));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        Err(StoreError::NotFound(id.to_string()))
    }

    fn transfer(&self, id: &str, from: NotificationKind, to: NotificationKind) -> Result<(), StoreError> {
        validate_notification_id(id)?;

        fs::create_dir_all(self.dir(to))?;
        fs::rename(self.path(from, id), self.path(to, id)).map_err(|e| StoreError::from_io(id, e))?;
        debug!(id, from = from.dir_name(), to = to.dir_name(), "moved notification");
        Ok(())
    }

    /// Moves `id` from `unread/` to `archive/`.
    pub fn archive(&self, id: &str) -> Result<(), StoreError> {
        self.transfer(id, NotificationKind::Unread, NotificationKind::Archive)
    }

    pub fn unarchive(&self, id: &str) -> Result<(), StoreError> {
        self.transfer(id, NotificationKind::Archive, NotificationKind::Unread)
    }

    /// Removes `id` from `archive/` when `archived`, else from `unread/`.
    pub fn delete(&self, id: &str, archived: bool) -> Result<(), StoreError> {
        validate_notification_id(id)?;

        let kind = if archived {
            NotificationKind::Archive
        } else {
            NotificationKind::Unread
        };
        fs::remove_file(self.path(kind, id)).map_err(|e| StoreError::from_io(id, e))?;
        debug!(id, dir = kind.dir_name(), "deleted notification");
        Ok(())
    }

    /// All notifications, newest first.
    pub fn list(&self) -> NotificationList {
        NotificationList::new(load_notifications(&RealFs, &self.base), chrono::Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BODY: &str = "timestamp=1731931200\nevent=Array\nsubject=Disk 3 is hot\nimportance=warning\n";
    const ID: &str = "20241118-120000-test.notify";

    const MALICIOUS: [&str; 8] = [
        "",
        "../../../etc/passwd",
        "..\\..\\windows\\system32",
        "test/../../../etc/passwd.notify",
        "....//....//etc/passwd.notify",
        "/etc/passwd.notify",
        "subdir/test.notify",
        "20241118-120000-test.txt",
    ];

    fn setup() -> (TempDir, NotificationStore) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("unread")).unwrap();
        fs::write(dir.path().join("unread").join(ID), BODY).unwrap();
        let store = NotificationStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_read() {
        let (_dir, store) = setup();
        let n = store.read(ID).unwrap();
        assert_eq!(n.subject, "Disk 3 is hot");
        assert_eq!(n.kind, NotificationKind::Unread);
        assert!(matches!(store.read("missing.notify"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_archive_creates_directory_and_unarchive_moves_back() {
        let (dir, store) = setup();
        assert!(!dir.path().join("archive").exists());

        store.archive(ID).unwrap();
        assert!(dir.path().join("archive").join(ID).exists());
        assert!(!dir.path().join("unread").join(ID).exists());
        assert_eq!(store.read(ID).unwrap().kind, NotificationKind::Archive);

        store.unarchive(ID).unwrap();
        assert!(dir.path().join("unread").join(ID).exists());
    }

    #[test]
    fn test_archive_missing_is_not_found() {
        let (_dir, store) = setup();
        assert!(matches!(store.archive("other.notify"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete() {
        let (dir, store) = setup();
        assert!(matches!(store.delete(ID, true), Err(StoreError::NotFound(_))));
        store.delete(ID, false).unwrap();
        assert!(!dir.path().join("unread").join(ID).exists());
    }

    #[test]
    fn test_malicious_ids_never_touch_disk() {
        let (dir, store) = setup();
        // a file the traversal ids would reach if joined
        fs::write(dir.path().join("victim.notify"), BODY).unwrap();

        for id in MALICIOUS {
            assert!(matches!(store.read(id), Err(StoreError::InvalidId(_))), "read {id}");
            assert!(matches!(store.archive(id), Err(StoreError::InvalidId(_))), "archive {id}");
            assert!(matches!(store.unarchive(id), Err(StoreError::InvalidId(_))), "unarchive {id}");
            assert!(matches!(store.delete(id, false), Err(StoreError::InvalidId(_))), "delete {id}");
        }
        assert!(matches!(
            store.delete("../victim.notify", false),
            Err(StoreError::InvalidId(NotificationIdError::ParentDirectoryReference))
        ));
        assert!(dir.path().join("victim.notify").exists());
        // archive/ is only created after validation passes
        assert!(!dir.path().join("archive").exists());
    }

    #[test]
    fn test_list() {
        let (dir, store) = setup();
        fs::create_dir_all(dir.path().join("archive")).unwrap();
        fs::write(
            dir.path().join("archive").join("old.notify"),
            "timestamp=1700000000\nevent=Old\nimportance=alert\n",
        )
        .unwrap();

        let list = store.list();
        assert_eq!(list.notifications.len(), 2);
        assert_eq!(list.notifications[0].id, ID);
        assert_eq!(list.overview.unread.warning, 1);
        assert_eq!(list.overview.archive.alert, 1);
    }
}
