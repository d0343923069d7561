//! Notification files on disk.
//!
//! - `id`: identifier validation; every id-keyed filesystem operation goes through it
//! - `file`: `.notify` body parsing and directory loading
//! - `store`: read, archive, unarchive and delete by id

mod file;
mod id;
mod store;

pub use file::{NOTIFY_EXTENSION, load_dir, load_notifications, parse_notify_file};
pub use id::{NotificationIdError, validate_notification_id};
pub use store::{NotificationStore, StoreError};
