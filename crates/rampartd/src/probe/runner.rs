//! Individual probes.

use chrono::{DateTime, Local};
use rampart_shared::RampartError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::time::timeout;
use tracing::debug;

use super::executor::run_command;
use super::{MarkerState, ProbeOutcome, ProbeResult, ProbeSpec};

/// Run one probe to completion or timeout. Never errors.
pub async fn run_probe(spec: ProbeSpec, limit: Duration) -> ProbeResult {
    let start = Instant::now();
    let subsystem = spec.subsystem();

    let outcome = match spec {
        ProbeSpec::MountPoint { path } => {
            let args = vec![path.to_string_lossy().to_string()];
            match run_command("mountpoint", &args, limit).await {
                Ok(out) => ProbeOutcome::Completed {
                    success: out.success,
                    output: out.stdout,
                },
                Err(e) => fault_outcome(e),
            }
        }
        ProbeSpec::LatestBackup { marker } => match timeout(limit, read_marker(&marker)).await {
            Ok(state) => ProbeOutcome::Marker(state),
            Err(_) => ProbeOutcome::TimedOut,
        },
        ProbeSpec::SnapshotTool { command, marker } => snapshot_outcome(&command, &marker, limit).await,
    };

    let result = ProbeResult {
        subsystem,
        elapsed: start.elapsed(),
        outcome,
    };
    debug!(
        "Probe {} finished in {}ms: success={}",
        subsystem,
        result.elapsed.as_millis(),
        result.success()
    );
    result
}

fn fault_outcome(err: RampartError) -> ProbeOutcome {
    match err {
        RampartError::ProbeTimeout => ProbeOutcome::TimedOut,
        RampartError::ProbeFault(detail) => ProbeOutcome::Fault(detail),
        other => ProbeOutcome::Fault(other.to_string()),
    }
}

async fn snapshot_outcome(command: &[String], marker: &Path, limit: Duration) -> ProbeOutcome {
    let Some((program, args)) = command.split_first() else {
        return ProbeOutcome::Fault("snapshot command is empty".to_string());
    };

    match run_command(program, args, limit).await {
        Ok(out) if out.success => ProbeOutcome::Snapshot {
            queryable: true,
            marker_present: fs::try_exists(marker).await.unwrap_or(false),
        },
        Ok(_) => ProbeOutcome::Snapshot {
            queryable: false,
            marker_present: false,
        },
        Err(RampartError::ProbeTimeout) => ProbeOutcome::TimedOut,
        // A tool that cannot even be started is simply not available
        Err(e) => {
            debug!("Snapshot query {} not runnable: {}", program, e);
            ProbeOutcome::Snapshot {
                queryable: false,
                marker_present: false,
            }
        }
    }
}

/// Read `latest_backup.txt` and resolve the path it names
pub async fn read_marker(marker: &Path) -> MarkerState {
    match fs::try_exists(marker).await {
        Ok(true) => {}
        Ok(false) => return MarkerState::Absent,
        Err(e) => return MarkerState::Unreadable(e.to_string()),
    }

    let content = match fs::read_to_string(marker).await {
        Ok(content) => content,
        Err(e) => return MarkerState::Unreadable(format!("{}: {}", marker.display(), e)),
    };

    // An empty marker names nothing, which is reported like a vanished target
    let target = PathBuf::from(content.trim());
    if target.as_os_str().is_empty() {
        return MarkerState::TargetMissing(target);
    }

    match fs::metadata(&target).await {
        Ok(meta) => match meta.modified() {
            Ok(mtime) => MarkerState::Present(DateTime::<Local>::from(mtime)),
            Err(e) => MarkerState::Unreadable(e.to_string()),
        },
        Err(e) if e.kind() == ErrorKind::NotFound => MarkerState::TargetMissing(target),
        Err(e) => MarkerState::Unreadable(format!("{}: {}", target.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_shared::Subsystem;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_marker_absent() {
        let dir = TempDir::new().unwrap();
        let state = read_marker(&dir.path().join("latest_backup.txt")).await;
        assert_eq!(state, MarkerState::Absent);
    }

    #[tokio::test]
    async fn test_marker_points_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("backup_2024.tar.gz");
        std::fs::write(&artifact, b"data").unwrap();
        let expected = DateTime::<Local>::from(std::fs::metadata(&artifact).unwrap().modified().unwrap());

        let marker = dir.path().join("latest_backup.txt");
        std::fs::write(&marker, format!("{}\n", artifact.display())).unwrap();

        assert_eq!(read_marker(&marker).await, MarkerState::Present(expected));
    }

    #[tokio::test]
    async fn test_marker_points_to_missing_file() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("latest_backup.txt");
        let gone = dir.path().join("gone.tar.gz");
        std::fs::write(&marker, gone.display().to_string()).unwrap();

        assert_eq!(read_marker(&marker).await, MarkerState::TargetMissing(gone));
    }

    #[tokio::test]
    async fn test_marker_that_is_a_directory_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("latest_backup.txt");
        std::fs::create_dir(&marker).unwrap();

        assert!(matches!(read_marker(&marker).await, MarkerState::Unreadable(_)));
    }

    #[tokio::test]
    async fn test_snapshot_not_queryable() {
        let dir = TempDir::new().unwrap();
        let spec = ProbeSpec::SnapshotTool {
            command: vec!["false".to_string()],
            marker: dir.path().join("latest_snapshot.txt"),
        };
        let result = run_probe(spec, Duration::from_secs(5)).await;
        assert_eq!(result.subsystem, Subsystem::SnapshotTool);
        assert_eq!(
            result.outcome,
            ProbeOutcome::Snapshot {
                queryable: false,
                marker_present: false
            }
        );
    }

    #[tokio::test]
    async fn test_snapshot_queryable_with_marker() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("latest_snapshot.txt");
        std::fs::write(&marker, "2024-03-09_14-00-01").unwrap();
        let spec = ProbeSpec::SnapshotTool {
            command: vec!["true".to_string()],
            marker,
        };
        let result = run_probe(spec, Duration::from_secs(5)).await;
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_snapshot_tool_missing_is_not_queryable() {
        let dir = TempDir::new().unwrap();
        let spec = ProbeSpec::SnapshotTool {
            command: vec!["/nonexistent/timeshift".to_string(), "--list".to_string()],
            marker: dir.path().join("latest_snapshot.txt"),
        };
        let result = run_probe(spec, Duration::from_secs(5)).await;
        assert_eq!(
            result.outcome,
            ProbeOutcome::Snapshot {
                queryable: false,
                marker_present: false
            }
        );
    }

    #[tokio::test]
    async fn test_snapshot_empty_command_is_fault() {
        let spec = ProbeSpec::SnapshotTool {
            command: Vec::new(),
            marker: PathBuf::from("/nonexistent"),
        };
        let result = run_probe(spec, Duration::from_secs(1)).await;
        assert!(matches!(result.outcome, ProbeOutcome::Fault(_)));
    }
}
