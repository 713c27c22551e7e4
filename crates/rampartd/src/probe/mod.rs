//! Probe runner: bounded external checks producing `ProbeResult`s.
//!
//! Probes never fail outward. Timeouts and faults are folded into the
//! outcome so the reducer can turn them into a status value.

mod executor;
mod runner;

pub use executor::{run_command, CommandOutput};
pub use runner::{read_marker, run_probe};

use chrono::{DateTime, Local};
use rampart_shared::{Settings, Subsystem};
use std::path::PathBuf;
use std::time::Duration;

/// What to check for one subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeSpec {
    /// `mountpoint <path>`
    MountPoint { path: PathBuf },
    /// `latest_backup.txt` naming the newest local copy
    LatestBackup { marker: PathBuf },
    /// Snapshot listing command plus the snapshot marker file
    SnapshotTool { command: Vec<String>, marker: PathBuf },
}

impl ProbeSpec {
    pub fn subsystem(&self) -> Subsystem {
        match self {
            ProbeSpec::MountPoint { .. } => Subsystem::RemoteMount,
            ProbeSpec::LatestBackup { .. } => Subsystem::LocalBackup,
            ProbeSpec::SnapshotTool { .. } => Subsystem::SnapshotTool,
        }
    }

    /// One spec per polled subsystem, built from a settings snapshot
    pub fn for_settings(settings: &Settings) -> Vec<ProbeSpec> {
        vec![
            ProbeSpec::MountPoint {
                path: settings.remote_mount_point.clone(),
            },
            ProbeSpec::LatestBackup {
                marker: settings.latest_backup_marker(),
            },
            ProbeSpec::SnapshotTool {
                command: settings.snapshot_command.clone(),
                marker: settings.snapshot_marker.clone(),
            },
        ]
    }
}

/// Three-way observation of a marker file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerState {
    /// No marker file
    Absent,
    /// Marker names a path that no longer exists
    TargetMissing(PathBuf),
    /// Marker or target could not be read
    Unreadable(String),
    /// Target exists; its last-modified time
    Present(DateTime<Local>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Command ran to completion
    Completed { success: bool, output: String },
    Marker(MarkerState),
    Snapshot { queryable: bool, marker_present: bool },
    TimedOut,
    Fault(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub subsystem: Subsystem,
    pub elapsed: Duration,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn new(subsystem: Subsystem, outcome: ProbeOutcome) -> Self {
        Self {
            subsystem,
            elapsed: Duration::ZERO,
            outcome,
        }
    }

    pub fn success(&self) -> bool {
        match &self.outcome {
            ProbeOutcome::Completed { success, .. } => *success,
            ProbeOutcome::Marker(state) => matches!(state, MarkerState::Present(_)),
            ProbeOutcome::Snapshot { queryable, marker_present } => *queryable && *marker_present,
            ProbeOutcome::TimedOut | ProbeOutcome::Fault(_) => false,
        }
    }

    /// Captured text, or the failure detail for timeouts and faults
    pub fn output(&self) -> &str {
        match &self.outcome {
            ProbeOutcome::Completed { output, .. } => output,
            ProbeOutcome::Marker(MarkerState::Unreadable(detail)) => detail,
            ProbeOutcome::TimedOut => "timed out",
            ProbeOutcome::Fault(detail) => detail,
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specs_cover_polled_subsystems() {
        let specs = ProbeSpec::for_settings(&Settings::default());
        let subsystems: Vec<_> = specs.iter().map(|s| s.subsystem()).collect();
        assert_eq!(
            subsystems,
            vec![Subsystem::RemoteMount, Subsystem::LocalBackup, Subsystem::SnapshotTool]
        );
    }

    #[test]
    fn test_timeout_result_accessors() {
        let result = ProbeResult::new(Subsystem::RemoteMount, ProbeOutcome::TimedOut);
        assert!(!result.success());
        assert_eq!(result.output(), "timed out");
    }
}
