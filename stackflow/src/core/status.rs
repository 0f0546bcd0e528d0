//! Workspace execution status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a workspace within one sequencer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    /// Not attempted yet.
    #[default]
    Pending,
    /// The deploy or destroy step is in progress.
    Running,
    /// The step completed.
    Succeeded,
    /// The step failed and the sequencer halted.
    Failed,
}

impl fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl WorkspaceStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the workspace was attempted in this run.
    #[must_use]
    pub fn was_attempted(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(WorkspaceStatus::Pending.to_string(), "pending");
        assert_eq!(WorkspaceStatus::Running.to_string(), "running");
        assert_eq!(WorkspaceStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(WorkspaceStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_default_is_pending() {
        assert_eq!(WorkspaceStatus::default(), WorkspaceStatus::Pending);
        assert!(!WorkspaceStatus::default().was_attempted());
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(WorkspaceStatus::Succeeded.is_terminal());
        assert!(WorkspaceStatus::Failed.is_terminal());
        assert!(!WorkspaceStatus::Pending.is_terminal());
        assert!(!WorkspaceStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&WorkspaceStatus::Succeeded).unwrap();
        assert_eq!(json, r#""succeeded""#);

        let deserialized: WorkspaceStatus = serde_json::from_str(r#""failed""#).unwrap();
        assert_eq!(deserialized, WorkspaceStatus::Failed);
    }
}
