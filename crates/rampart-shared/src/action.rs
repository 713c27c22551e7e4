//! On-demand action identities and their state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Actions a user can trigger. Each kind has at most one execution in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateBackup,
    MountRemote,
    TestConnectivity,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [
        ActionKind::CreateBackup,
        ActionKind::MountRemote,
        ActionKind::TestConnectivity,
    ];

    pub fn index(self) -> usize {
        match self {
            ActionKind::CreateBackup => 0,
            ActionKind::MountRemote => 1,
            ActionKind::TestConnectivity => 2,
        }
    }

    /// Short name for file names and commands
    pub fn slug(self) -> &'static str {
        match self {
            ActionKind::CreateBackup => "create-backup",
            ActionKind::MountRemote => "mount-remote",
            ActionKind::TestConnectivity => "test-connectivity",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::CreateBackup => write!(f, "create backup"),
            ActionKind::MountRemote => write!(f, "mount remote storage"),
            ActionKind::TestConnectivity => write!(f, "test connectivity"),
        }
    }
}

/// Idle -> Running -> {Succeeded, Failed} -> Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl ActionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: ActionState) -> bool {
        matches!(
            (self, next),
            (ActionState::Idle, ActionState::Running)
                | (ActionState::Running, ActionState::Succeeded)
                | (ActionState::Running, ActionState::Failed)
                | (ActionState::Succeeded, ActionState::Idle)
                | (ActionState::Failed, ActionState::Idle)
        )
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionState::Idle => write!(f, "IDLE"),
            ActionState::Running => write!(f, "RUNNING"),
            ActionState::Succeeded => write!(f, "SUCCEEDED"),
            ActionState::Failed => write!(f, "FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(ActionState::Idle.can_transition_to(ActionState::Running));
        assert!(ActionState::Running.can_transition_to(ActionState::Failed));
        assert!(ActionState::Succeeded.can_transition_to(ActionState::Idle));
        assert!(!ActionState::Idle.can_transition_to(ActionState::Succeeded));
        assert!(!ActionState::Running.can_transition_to(ActionState::Running));
    }

    #[test]
    fn test_indices_are_distinct() {
        let mut seen = [false; 3];
        for kind in ActionKind::ALL {
            assert!(!seen[kind.index()]);
            seen[kind.index()] = true;
        }
    }
}
