//! Line commands read from stdin while `watch` runs.
//!
//! Each line is one command. On-demand actions go through the same
//! `Trigger` as auto start, so a command for an action already in flight is
//! absorbed.

use owo_colors::OwoColorize;
use rampart_shared::ActionKind;
use std::future::Future;
use std::io::BufRead;
use std::ops::ControlFlow;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::actions::{Trigger, TriggerOutcome};
use crate::display;
use crate::reconciler::Reconciler;

pub const HELP: &str = "Commands: backup, mount, test, refresh, clear, status, help, quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Backup,
    Mount,
    Test,
    Refresh,
    Clear,
    Status,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "backup" | "b" => Some(ConsoleCommand::Backup),
            "mount" | "m" => Some(ConsoleCommand::Mount),
            "test" | "t" => Some(ConsoleCommand::Test),
            "refresh" | "r" => Some(ConsoleCommand::Refresh),
            "clear" | "c" => Some(ConsoleCommand::Clear),
            "status" | "s" => Some(ConsoleCommand::Status),
            "help" | "h" | "?" => Some(ConsoleCommand::Help),
            "quit" | "q" | "exit" => Some(ConsoleCommand::Quit),
            _ => None,
        }
    }
}

/// Carry out one command. `Break` means the user asked to quit.
pub fn dispatch(command: ConsoleCommand, trigger: &Trigger, reconciler: &Reconciler) -> ControlFlow<()> {
    match command {
        ConsoleCommand::Backup => fire(trigger, ActionKind::CreateBackup),
        ConsoleCommand::Mount => fire(trigger, ActionKind::MountRemote),
        ConsoleCommand::Test => fire(trigger, ActionKind::TestConnectivity),
        ConsoleCommand::Refresh => {
            let _ = trigger.refresh();
        }
        ConsoleCommand::Clear => reconciler.clear(),
        ConsoleCommand::Status => println!("{}", display::render_board(&reconciler.snapshot())),
        ConsoleCommand::Help => println!("{}", HELP.dimmed()),
        ConsoleCommand::Quit => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

fn fire(trigger: &Trigger, kind: ActionKind) {
    if let TriggerOutcome::AlreadyRunning = trigger.fire(kind) {
        println!("{}", format!("[NOTE] {} is already running", kind).yellow());
    }
}

/// Lines typed on stdin.
///
/// Read on a plain thread: a blocked terminal read must not hold up
/// shutdown after ctrl-c.
pub fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Console input error: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Apply `lines` as commands until quit or `shutdown`.
///
/// End of input does not stop the loop: the monitor keeps running until
/// `shutdown` resolves.
pub async fn run<S>(
    mut lines: mpsc::UnboundedReceiver<String>,
    trigger: &Trigger,
    reconciler: &Reconciler,
    shutdown: S,
) where
    S: Future<Output = ()>,
{
    let mut input_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.recv(), if input_open => match line {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match ConsoleCommand::parse(&line) {
                    Some(command) => {
                        if dispatch(command, trigger, reconciler).is_break() {
                            break;
                        }
                    }
                    None => println!("Unknown command: {} ({})", line.trim(), HELP),
                },
                None => {
                    debug!("Console input closed");
                    input_open = false;
                }
            },
        }
    }
}
