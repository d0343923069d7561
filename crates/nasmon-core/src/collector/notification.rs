//! Notification overview from the store directories.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::collector::error::CollectError;
use crate::collector::traits::{Collector, FileSystem};
use crate::config::Paths;
use crate::hub::{Payload, topics};
use crate::models::NotificationList;
use crate::notification::load_notifications;

pub struct NotificationCollector {
    fs: Arc<dyn FileSystem>,
    base: PathBuf,
}

impl NotificationCollector {
    pub fn new(fs: Arc<dyn FileSystem>, paths: &Paths) -> Self {
        Self {
            fs,
            base: paths.notifications_dir.clone(),
        }
    }

    pub fn collect_list(&self, now: DateTime<Utc>) -> NotificationList {
        NotificationList::new(load_notifications(self.fs.as_ref(), &self.base), now)
    }
}

impl Collector for NotificationCollector {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn topic(&self) -> &'static str {
        topics::NOTIFICATIONS
    }

    fn sample(&mut self) -> Result<Payload, CollectError> {
        let list = self.collect_list(Utc::now());
        debug!(
            collector = "notification",
            unread = list.overview.unread.total,
            archive = list.overview.archive.total,
            "collected notifications"
        );
        Ok(Payload::new(list))
    }
}
