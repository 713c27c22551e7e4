//! Backup script collaborator.
//!
//! The script is invoked as `bash <script> [mode]`. Only its exit status,
//! stdout lines and stderr text are consumed.

use rampart_shared::{LogLevel, RampartError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::probe::run_command;

/// Script entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    /// Default mode: run a backup
    Backup,
    /// Check the remote storage credentials and reachability
    TestConnectivity,
    /// Mount the remote storage
    MountRemote,
}

impl ScriptMode {
    pub fn arg(self) -> Option<&'static str> {
        match self {
            ScriptMode::Backup => None,
            ScriptMode::TestConnectivity => Some("test-gdrive"),
            ScriptMode::MountRemote => Some("mount-gdrive"),
        }
    }
}

/// What a script run produced. Timeouts and spawn failures are unsuccessful
/// runs with the reason in `stderr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptOutcome {
    /// Non-blank stdout lines with the level their marker implies
    pub fn leveled_lines(&self) -> impl Iterator<Item = (LogLevel, &str)> {
        self.stdout
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(|line| (LogLevel::from_script_line(line), line))
    }

    /// Stderr trimmed for a one-line log message
    pub fn error_detail(&self) -> &str {
        let detail = self.stderr.trim();
        if detail.is_empty() {
            "no error output"
        } else {
            detail
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    script: PathBuf,
    limit: Duration,
}

impl ScriptRunner {
    pub fn new(script: impl AsRef<Path>, limit: Duration) -> Self {
        Self {
            script: script.as_ref().to_path_buf(),
            limit,
        }
    }

    pub async fn run(&self, mode: ScriptMode) -> ScriptOutcome {
        let mut args = vec![self.script.to_string_lossy().to_string()];
        if let Some(arg) = mode.arg() {
            args.push(arg.to_string());
        }
        info!("Running backup script: bash {}", args.join(" "));

        match run_command("bash", &args, self.limit).await {
            Ok(out) => ScriptOutcome {
                success: out.success,
                stdout: out.stdout,
                stderr: out.stderr,
            },
            Err(RampartError::ProbeTimeout) => ScriptOutcome {
                success: false,
                stdout: String::new(),
                stderr: "Command timed out".to_string(),
            },
            Err(e) => ScriptOutcome {
                success: false,
                stdout: String::new(),
                stderr: e.to_string(),
            },
        }
    }
}

/// Run an arbitrary helper command (mount helper lookup, auth command)
pub async fn run_helper(command: &[String], limit: Duration) -> ScriptOutcome {
    let Some((program, args)) = command.split_first() else {
        return ScriptOutcome {
            success: false,
            stdout: String::new(),
            stderr: "empty command".to_string(),
        };
    };
    match run_command(program, args, limit).await {
        Ok(out) => ScriptOutcome {
            success: out.success,
            stdout: out.stdout,
            stderr: out.stderr,
        },
        Err(e) => ScriptOutcome {
            success: false,
            stdout: String::new(),
            stderr: e.to_string(),
        },
    }
}
