//! Command execution with a hard time bound.

use rampart_shared::{RampartError, Result};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Run `program args..` and wait at most `limit`.
///
/// On timeout the child is dropped, which kills it (best effort; it may
/// outlive this call briefly). Spawn and read errors become `ProbeFault`.
pub async fn run_command(program: &str, args: &[String], limit: Duration) -> Result<CommandOutput> {
    let start = Instant::now();
    debug!("  Executing: {} {:?}", program, args);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RampartError::ProbeFault(format!("failed to start {}: {}", program, e)))?;

    match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            elapsed: start.elapsed(),
        }),
        Ok(Err(e)) => Err(RampartError::ProbeFault(format!("{}: {}", program, e))),
        Err(_) => {
            warn!("Command timeout after {:?}: {}", limit, program);
            Err(RampartError::ProbeTimeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_execute_echo() {
        let out = run_command("echo", &args(&["hello"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_execute_failure() {
        let out = run_command("false", &[], Duration::from_secs(5)).await.unwrap();
        assert!(!out.success);
    }

    #[tokio::test]
    async fn test_timeout() {
        let started = Instant::now();
        let err = run_command("sleep", &args(&["5"]), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, RampartError::ProbeTimeout));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_program_is_fault() {
        let err = run_command("/nonexistent/rampart-probe", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        match err {
            RampartError::ProbeFault(detail) => assert!(detail.contains("failed to start")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
