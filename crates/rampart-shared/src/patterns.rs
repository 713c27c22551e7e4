//! Pattern table mapping free-form text to status values.
//!
//! Probe output and log messages are matched against an ordered rule list;
//! the first rule for the subsystem and source that matches wins.

use regex::Regex;
use std::sync::LazyLock;

use crate::subsystem::{StatusValue, Subsystem};

/// Where the matched text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSource {
    /// Captured stdout of a probe command
    ProbeOutput,
    /// Message appended to the event log
    LogMessage,
}

#[derive(Debug, Clone)]
pub struct StatusRule {
    pub subsystem: Subsystem,
    pub source: PatternSource,
    pub pattern: Regex,
    pub value: StatusValue,
}

static DEFAULT_RULES: LazyLock<Vec<StatusRule>> = LazyLock::new(|| {
    vec![
        // `mountpoint <dir>` prints "<dir> is a mountpoint" / "is not a mountpoint"
        StatusRule {
            subsystem: Subsystem::RemoteMount,
            source: PatternSource::ProbeOutput,
            pattern: Regex::new(r"(?i)\bis a mountpoint\b").unwrap(),
            value: StatusValue::Connected,
        },
        // Failure phrasing first: "not mounted" also contains "mounted"
        StatusRule {
            subsystem: Subsystem::RemoteMount,
            source: PatternSource::LogMessage,
            pattern: Regex::new(
                r"(?i)(remote storage|google drive).*\b(not mounted|unmounted|disconnected|mount failed|failed)\b",
            )
            .unwrap(),
            value: StatusValue::Disconnected,
        },
        StatusRule {
            subsystem: Subsystem::RemoteMount,
            source: PatternSource::LogMessage,
            pattern: Regex::new(r"(?i)(remote storage|google drive).*\b(mounted|connected)\b").unwrap(),
            value: StatusValue::Connected,
        },
    ]
});

/// Marker the backup script prints after a successful mount, e.g.
/// "Google Drive mounted". "Drive not mounted" must not count.
static MOUNT_CONFIRMATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(drive|storage) mounted\b").unwrap());

/// Ordered rule list
#[derive(Debug, Clone)]
pub struct StatusPatterns {
    rules: Vec<StatusRule>,
    mount_confirmation: Regex,
}

impl Default for StatusPatterns {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
            mount_confirmation: MOUNT_CONFIRMATION.clone(),
        }
    }
}

impl StatusPatterns {
    /// Status implied by a probe's captured text, if any rule matches
    pub fn match_probe_output(&self, subsystem: Subsystem, text: &str) -> Option<&StatusValue> {
        self.rules
            .iter()
            .filter(|r| r.source == PatternSource::ProbeOutput && r.subsystem == subsystem)
            .find(|r| r.pattern.is_match(text))
            .map(|r| &r.value)
    }

    /// Status update triggered by a log message, if any rule matches
    pub fn match_log_message(&self, message: &str) -> Option<(Subsystem, StatusValue)> {
        self.rules
            .iter()
            .filter(|r| r.source == PatternSource::LogMessage)
            .find(|r| r.pattern.is_match(message))
            .map(|r| (r.subsystem, r.value.clone()))
    }

    /// Whether mount-mode script output reports success
    pub fn is_mount_confirmation(&self, stdout: &str) -> bool {
        self.mount_confirmation.is_match(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mountpoint_output() {
        let patterns = StatusPatterns::default();
        assert_eq!(
            patterns.match_probe_output(Subsystem::RemoteMount, "/home/u/GoogleDrive is a mountpoint\n"),
            Some(&StatusValue::Connected)
        );
        assert_eq!(
            patterns.match_probe_output(Subsystem::RemoteMount, "/home/u/GoogleDrive is not a mountpoint"),
            None
        );
        assert_eq!(patterns.match_probe_output(Subsystem::SnapshotTool, "is a mountpoint"), None);
    }

    #[test]
    fn test_log_message_triggers() {
        let patterns = StatusPatterns::default();
        assert_eq!(
            patterns.match_log_message("Remote storage mounted successfully!"),
            Some((Subsystem::RemoteMount, StatusValue::Connected))
        );
        assert_eq!(
            patterns.match_log_message("Remote storage mount failed: fuse: device busy"),
            Some((Subsystem::RemoteMount, StatusValue::Disconnected))
        );
        assert_eq!(
            patterns.match_log_message("Google Drive not mounted"),
            Some((Subsystem::RemoteMount, StatusValue::Disconnected))
        );
        assert_eq!(patterns.match_log_message("Attempting to mount remote storage..."), None);
        assert_eq!(patterns.match_log_message("Backup completed successfully!"), None);
    }

    #[test]
    fn test_mount_confirmation() {
        let patterns = StatusPatterns::default();
        assert!(patterns.is_mount_confirmation("[INFO] Google Drive mounted at /home/u/GoogleDrive"));
        assert!(!patterns.is_mount_confirmation("[ERROR] mount helper exited"));
        assert!(!patterns.is_mount_confirmation("[WARN] Google Drive not mounted"));
        assert!(!patterns.is_mount_confirmation("remote storage unmounted"));
        assert!(!patterns.is_mount_confirmation("mounted"));
    }
}
