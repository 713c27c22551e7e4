//! Shared types for Rampart components.
//!
//! Subsystems and their status values, the event log, the status pattern
//! table, action identities and the settings record.

pub mod action;
pub mod config;
pub mod error;
pub mod event_log;
pub mod patterns;
pub mod subsystem;

pub use action::{ActionKind, ActionState};
pub use config::Settings;
pub use error::{RampartError, Result};
pub use event_log::{EventLog, LogEntry, LogLevel};
pub use patterns::{PatternSource, StatusPatterns};
pub use subsystem::{StatusValue, Subsystem, Tone};

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
