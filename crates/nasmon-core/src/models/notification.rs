//! Notification snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a notification. Files written with `normal` map to `Info`.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Alert,
    Warning,
    #[default]
    Info,
}

impl Importance {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "alert" => Importance::Alert,
            "warning" => Importance::Warning,
            _ => Importance::Info,
        }
    }
}

/// Which store directory a notification lives in.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Unread,
    Archive,
}

impl NotificationKind {
    /// Directory name under the store base.
    pub fn dir_name(self) -> &'static str {
        match self {
            NotificationKind::Unread => "unread",
            NotificationKind::Archive => "archive",
        }
    }
}

/// One `.notify` file.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Notification {
    /// File name including the `.notify` suffix.
    pub id: String,
    /// The `event` key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub importance: Importance,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

/// Counts per importance for one store directory.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct NotificationCounts {
    pub info: usize,
    pub warning: usize,
    pub alert: usize,
    pub total: usize,
}

impl NotificationCounts {
    pub fn add(&mut self, importance: Importance) {
        match importance {
            Importance::Info => self.info += 1,
            Importance::Warning => self.warning += 1,
            Importance::Alert => self.alert += 1,
        }
        self.total += 1;
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct NotificationOverview {
    pub unread: NotificationCounts,
    pub archive: NotificationCounts,
}

/// Payload of `notifications_update`, newest first.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct NotificationList {
    pub overview: NotificationOverview,
    pub notifications: Vec<Notification>,
    pub timestamp: DateTime<Utc>,
}

impl NotificationList {
    pub fn new(mut notifications: Vec<Notification>, timestamp: DateTime<Utc>) -> Self {
        notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));

        let mut overview = NotificationOverview::default();
        for n in &notifications {
            match n.kind {
                NotificationKind::Unread => overview.unread.add(n.importance),
                NotificationKind::Archive => overview.archive.add(n.importance),
            }
        }

        Self {
            overview,
            notifications,
            timestamp,
        }
    }
}
