//! Error types for Rampart.

use thiserror::Error;

use crate::action::ActionKind;

#[derive(Error, Debug)]
pub enum RampartError {
    #[error("timed out")]
    ProbeTimeout,

    #[error("Probe fault: {0}")]
    ProbeFault(String),

    #[error("{kind} failed: {detail}")]
    ActionFailed { kind: ActionKind, detail: String },

    #[error("{0} already running")]
    ActionAlreadyRunning(ActionKind),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RampartError>;
