//! Monitored subsystems and the status values displayed for them.
//!
//! Every subsystem has exactly one `StatusValue` at any instant. A subsystem
//! that has never completed a probe reads `Checking`.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backup-related components being monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    /// Remote storage mount point (FUSE cloud mount)
    RemoteMount,
    /// Local copy tracked by `latest_backup.txt`
    LocalBackup,
    /// Snapshot utility and its marker file
    SnapshotTool,
    /// Outcome of the most recent create-backup action; never polled
    LastBackup,
}

impl Subsystem {
    pub const ALL: [Subsystem; 4] = [
        Subsystem::RemoteMount,
        Subsystem::LocalBackup,
        Subsystem::SnapshotTool,
        Subsystem::LastBackup,
    ];

    /// Dense index for per-subsystem tables
    pub fn index(self) -> usize {
        match self {
            Subsystem::RemoteMount => 0,
            Subsystem::LocalBackup => 1,
            Subsystem::SnapshotTool => 2,
            Subsystem::LastBackup => 3,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Subsystem::RemoteMount => "Remote Storage",
            Subsystem::LocalBackup => "Local Backup",
            Subsystem::SnapshotTool => "Snapshots",
            Subsystem::LastBackup => "Last Backup",
        }
    }

    /// Whether the periodic probe cycle checks this subsystem
    pub fn is_polled(self) -> bool {
        !matches!(self, Subsystem::LastBackup)
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subsystem::RemoteMount => write!(f, "remote-storage-mount"),
            Subsystem::LocalBackup => write!(f, "local-backup"),
            Subsystem::SnapshotTool => write!(f, "snapshot-tool"),
            Subsystem::LastBackup => write!(f, "last-backup-run"),
        }
    }
}

/// Visual weight of a status, used by renderers for colouring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Success,
    Warning,
    Error,
    Neutral,
}

/// Displayed state of a subsystem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StatusValue {
    /// No completed probe yet
    #[default]
    Checking,
    Connected,
    Disconnected,
    /// Mount action in progress
    Connecting,
    /// Marker file absent
    NoMarker,
    /// Marker present but the artifact it names is gone
    NotFound,
    /// Snapshot tool usable but no snapshot recorded
    NoSnapshots,
    /// Snapshot tool cannot be queried without a prompt
    Unavailable,
    /// Last backup run failed
    Failed,
    Error(String),
    Timestamped(DateTime<Local>),
}

impl StatusValue {
    pub fn tone(&self) -> Tone {
        match self {
            StatusValue::Connected | StatusValue::Timestamped(_) => Tone::Success,
            StatusValue::Connecting | StatusValue::NoMarker | StatusValue::NoSnapshots => {
                Tone::Warning
            }
            StatusValue::Disconnected
            | StatusValue::NotFound
            | StatusValue::Unavailable
            | StatusValue::Failed
            | StatusValue::Error(_) => Tone::Error,
            StatusValue::Checking => Tone::Neutral,
        }
    }

    pub fn is_checking(&self) -> bool {
        matches!(self, StatusValue::Checking)
    }

    /// Text shown next to `subsystem`'s title
    pub fn label_for(&self, subsystem: Subsystem) -> String {
        match (self, subsystem) {
            (StatusValue::Connected, Subsystem::SnapshotTool) => "Available".to_string(),
            (StatusValue::Timestamped(at), Subsystem::LastBackup) => {
                format!("Completed at {}", at.format("%H:%M:%S"))
            }
            (StatusValue::Timestamped(at), _) => at.format("%m-%d %H:%M").to_string(),
            (other, _) => other.to_string(),
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusValue::Checking => write!(f, "Checking..."),
            StatusValue::Connected => write!(f, "Connected"),
            StatusValue::Disconnected => write!(f, "Disconnected"),
            StatusValue::Connecting => write!(f, "Connecting..."),
            StatusValue::NoMarker => write!(f, "None"),
            StatusValue::NotFound => write!(f, "Not Found"),
            StatusValue::NoSnapshots => write!(f, "No Snapshots"),
            StatusValue::Unavailable => write!(f, "Not Available"),
            StatusValue::Failed => write!(f, "Failed"),
            StatusValue::Error(detail) => write!(f, "{}", detail),
            StatusValue::Timestamped(at) => write!(f, "{}", at.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_is_checking() {
        assert_eq!(StatusValue::default(), StatusValue::Checking);
        assert_eq!(StatusValue::Checking.tone(), Tone::Neutral);
    }

    #[test]
    fn test_labels_per_subsystem() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let stamped = StatusValue::Timestamped(at);
        assert_eq!(stamped.label_for(Subsystem::LocalBackup), "03-09 14:05");
        assert_eq!(stamped.label_for(Subsystem::LastBackup), "Completed at 14:05:07");
        assert_eq!(StatusValue::Connected.label_for(Subsystem::SnapshotTool), "Available");
        assert_eq!(StatusValue::Connected.label_for(Subsystem::RemoteMount), "Connected");
        assert_eq!(StatusValue::NoMarker.label_for(Subsystem::LocalBackup), "None");
    }

    #[test]
    fn test_only_last_backup_is_unpolled() {
        let polled: Vec<_> = Subsystem::ALL.iter().filter(|s| s.is_polled()).collect();
        assert_eq!(polled.len(), 3);
        assert!(!Subsystem::LastBackup.is_polled());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&StatusValue::Error("timed out".into())).unwrap();
        assert_eq!(json, r#"{"kind":"error","value":"timed out"}"#);
        let back: StatusValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StatusValue::Error("timed out".into()));
    }
}
