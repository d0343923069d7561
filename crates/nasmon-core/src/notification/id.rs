use thiserror::Error;

use super::file::NOTIFY_EXTENSION;

/// Why an identifier was refused.
///
/// Display strings are stable and returned to callers as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotificationIdError {
    #[error("notification ID cannot be empty")]
    Empty,
    #[error("invalid notification ID: parent directory references not allowed")]
    ParentDirectoryReference,
    #[error("invalid notification ID: absolute paths not allowed")]
    AbsolutePath,
    #[error("invalid notification ID: path separators not allowed")]
    PathSeparator,
    #[error("invalid notification ID: must have .notify extension")]
    BadExtension,
}

impl NotificationIdError {
    /// Machine-readable reason.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationIdError::Empty => "empty",
            NotificationIdError::ParentDirectoryReference => "parent-directory-reference",
            NotificationIdError::AbsolutePath => "absolute-path",
            NotificationIdError::PathSeparator => "path-separator",
            NotificationIdError::BadExtension => "bad-extension",
        }
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Accepts `id` only if it can be joined unmodified onto a store directory.
///
/// Checks run in a fixed order: empty, `..` anywhere, leading separator,
/// any separator, `.notify` suffix. The id is an opaque string; percent
/// escapes are not decoded.
pub fn validate_notification_id(id: &str) -> Result<(), NotificationIdError> {
    if id.is_empty() {
        return Err(NotificationIdError::Empty);
    }
    if id.contains("..") {
        return Err(NotificationIdError::ParentDirectoryReference);
    }
    if id.starts_with(is_separator) {
        return Err(NotificationIdError::AbsolutePath);
    }
    if id.contains(is_separator) {
        return Err(NotificationIdError::PathSeparator);
    }
    if !id.ends_with(NOTIFY_EXTENSION) {
        return Err(NotificationIdError::BadExtension);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(id: &str) -> &'static str {
        validate_notification_id(id).unwrap_err().kind()
    }

    #[test]
    fn test_valid_ids() {
        for id in [
            "20241118-120000-test.notify",
            "20241118-120000-test_notification.notify",
            "simple.notify",
            // percent escapes stay literal
            "test%2Fpasswd.notify",
        ] {
            assert!(validate_notification_id(id).is_ok(), "{id} should be accepted");
        }
    }

    #[test]
    fn test_empty() {
        assert_eq!(kind(""), "empty");
        assert_eq!(
            validate_notification_id("").unwrap_err().to_string(),
            "notification ID cannot be empty"
        );
    }

    #[test]
    fn test_traversal_reported_before_separators() {
        for id in [
            "../../../etc/passwd",
            "..\\..\\windows\\system32",
            "test/../../../etc/passwd.notify",
            "....//....//etc/passwd.notify",
            "..notify",
            "a..b.notify",
        ] {
            assert_eq!(kind(id), "parent-directory-reference", "{id}");
        }
    }

    #[test]
    fn test_absolute_paths() {
        assert_eq!(kind("/etc/passwd.notify"), "absolute-path");
        assert_eq!(kind("\\etc\\passwd.notify"), "absolute-path");
        assert_eq!(kind("/passwd.notify"), "absolute-path");
    }

    #[test]
    fn test_separators() {
        assert_eq!(kind("subdir/test.notify"), "path-separator");
        assert_eq!(kind("subdir\\test.notify"), "path-separator");
        assert_eq!(
            validate_notification_id("subdir/test.notify").unwrap_err().to_string(),
            "invalid notification ID: path separators not allowed"
        );
    }

    #[test]
    fn test_extension() {
        assert_eq!(kind("20241118-120000-test"), "bad-extension");
        assert_eq!(kind("20241118-120000-test.txt"), "bad-extension");
        assert_eq!(kind("test.notify.bak"), "bad-extension");
    }
}
