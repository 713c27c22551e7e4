//! Terminal display collaborator.
//!
//! ASCII only. Colour follows the log level or the status tone.

use owo_colors::OwoColorize;
use rampart_shared::{LogEntry, LogLevel, StatusValue, Subsystem, Tone};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::reconciler::{DisplayEvent, Snapshot};

fn paint_level(entry: &LogEntry) -> String {
    let line = entry.to_string();
    match entry.level {
        LogLevel::Info => line.blue().to_string(),
        LogLevel::Warn => line.yellow().to_string(),
        LogLevel::Error => line.red().to_string(),
        LogLevel::Success => line.green().to_string(),
    }
}

fn paint_status(subsystem: Subsystem, value: &StatusValue) -> String {
    let label = value.label_for(subsystem);
    match value.tone() {
        Tone::Success => label.green().to_string(),
        Tone::Warning => label.yellow().to_string(),
        Tone::Error => label.red().to_string(),
        Tone::Neutral => label.dimmed().to_string(),
    }
}

/// One line per subsystem, titles padded to a column
pub fn render_board(snapshot: &Snapshot) -> String {
    Subsystem::ALL
        .iter()
        .map(|s| format!("  {:<16} {}", format!("{}:", s.title()), paint_status(*s, &snapshot.status(*s))))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_event(event: &DisplayEvent) -> String {
    match event {
        DisplayEvent::Log(entry) => paint_level(entry),
        DisplayEvent::LogCleared(entry) => format!("{}\n{}", "-".repeat(40).dimmed(), paint_level(entry)),
        DisplayEvent::Status { subsystem, value } => {
            format!("  * {}: {}", subsystem.title(), paint_status(*subsystem, value))
        }
        DisplayEvent::Action { kind, state } => format!("  > {} {}", kind, state).dimmed().to_string(),
    }
}

/// Print events until the reconciler goes away
pub async fn follow(mut events: broadcast::Receiver<DisplayEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => println!("{}", render_event(&event)),
            Err(RecvError::Lagged(skipped)) => warn!("Display lagged; {} event(s) skipped", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
