//! Status reducer: `ProbeResult -> StatusValue`.
//!
//! Pure and deterministic. Precedence per subsystem kind:
//! - mount-style: success + connected marker -> Connected, anything else
//!   completed (including timeouts and faults) -> Disconnected
//! - local backup marker: absent -> None, target missing -> Not Found,
//!   read fault -> Error, otherwise -> Timestamped(mtime)
//! - snapshot tool: queryable + marker -> Available, queryable -> No
//!   Snapshots, not queryable -> Not Available

use rampart_shared::{StatusPatterns, StatusValue, Subsystem};

use crate::probe::{MarkerState, ProbeOutcome, ProbeResult};

/// Detail shown when a file-based probe could not be read
pub const READ_ERROR_DETAIL: &str = "Error";

/// Detail shown when a probe exceeded its timeout
pub const TIMEOUT_DETAIL: &str = "timed out";

pub fn reduce(result: &ProbeResult, patterns: &StatusPatterns) -> StatusValue {
    match result.subsystem {
        Subsystem::RemoteMount => reduce_mount(result, patterns),
        Subsystem::LocalBackup | Subsystem::SnapshotTool | Subsystem::LastBackup => {
            reduce_observation(&result.outcome)
        }
    }
}

fn reduce_mount(result: &ProbeResult, patterns: &StatusPatterns) -> StatusValue {
    match &result.outcome {
        ProbeOutcome::Completed { success: true, output } => patterns
            .match_probe_output(result.subsystem, output)
            .cloned()
            .unwrap_or(StatusValue::Disconnected),
        _ => StatusValue::Disconnected,
    }
}

fn reduce_observation(outcome: &ProbeOutcome) -> StatusValue {
    match outcome {
        ProbeOutcome::Marker(MarkerState::Absent) => StatusValue::NoMarker,
        ProbeOutcome::Marker(MarkerState::TargetMissing(_)) => StatusValue::NotFound,
        ProbeOutcome::Marker(MarkerState::Unreadable(_)) => {
            StatusValue::Error(READ_ERROR_DETAIL.to_string())
        }
        ProbeOutcome::Marker(MarkerState::Present(at)) => StatusValue::Timestamped(*at),
        ProbeOutcome::Snapshot {
            queryable: true,
            marker_present: true,
        } => StatusValue::Connected,
        ProbeOutcome::Snapshot {
            queryable: true,
            marker_present: false,
        } => StatusValue::NoSnapshots,
        ProbeOutcome::Snapshot {
            queryable: false, ..
        } => StatusValue::Unavailable,
        ProbeOutcome::Completed { success: true, .. } => StatusValue::Connected,
        ProbeOutcome::Completed { success: false, .. } => StatusValue::Disconnected,
        ProbeOutcome::TimedOut => StatusValue::Error(TIMEOUT_DETAIL.to_string()),
        ProbeOutcome::Fault(detail) => StatusValue::Error(detail.clone()),
    }
}
