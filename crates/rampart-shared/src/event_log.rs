//! Event log sink: an append-only, leveled, timestamped record.
//!
//! Entries are never edited. The only removal is `clear()`, which empties the
//! sequence and records that it did so.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message shown as the sole entry after a clear
pub const CLEARED_MESSAGE: &str = "Log cleared";

/// Log level enum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
    Success,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Success => "SUCCESS",
        }
    }

    /// Level for one line of backup script output.
    ///
    /// The script tags lines with `[INFO]`, `[WARN]` or `[ERROR]`; untagged
    /// lines are INFO. The most severe tag wins when a line carries several.
    pub fn from_script_line(line: &str) -> Self {
        if line.contains("[ERROR]") {
            LogLevel::Error
        } else if line.contains("[WARN]") {
            LogLevel::Warn
        } else {
            LogLevel::Info
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Ordered, append-only sequence of entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<LogEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append with a fresh timestamp and return a copy of the new entry
    pub fn append(&mut self, level: LogLevel, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(level, message);
        self.entries.push(entry.clone());
        entry
    }

    /// Reset to empty, then record the clear itself
    pub fn clear(&mut self) -> LogEntry {
        self.entries.clear();
        self.append(LogLevel::Info, CLEARED_MESSAGE)
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }
}
