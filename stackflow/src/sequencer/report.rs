//! Outcome of one sequencer run.

use super::Action;
use crate::core::WorkspaceStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    /// Workspace name.
    pub workspace: String,
    /// Final status.
    pub status: WorkspaceStatus,
    /// Failure message, if any.
    pub error: Option<String>,
    /// When the step started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the step finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkspaceRecord {
    /// A workspace that has not been attempted.
    #[must_use]
    pub fn pending(workspace: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            status: WorkspaceStatus::Pending,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Step duration in milliseconds, once finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Per-workspace results of a run, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// The action performed.
    pub action: Action,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub finished_at: Option<DateTime<Utc>>,
    /// One record per workspace, in the order the action visits them.
    pub records: Vec<WorkspaceRecord>,
}

impl SequenceReport {
    /// Starts a report with every workspace pending.
    #[must_use]
    pub fn new(action: Action, workspaces: impl IntoIterator<Item = String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            action,
            started_at: Utc::now(),
            finished_at: None,
            records: workspaces.into_iter().map(WorkspaceRecord::pending).collect(),
        }
    }

    /// Returns true if every workspace succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.records
            .iter()
            .all(|record| record.status == WorkspaceStatus::Succeeded)
    }

    /// Workspaces that were started, in order.
    #[must_use]
    pub fn attempted(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|record| record.status.was_attempted())
            .map(|record| record.workspace.as_str())
            .collect()
    }

    /// The workspace that halted the run.
    #[must_use]
    pub fn failed_workspace(&self) -> Option<&str> {
        self.records
            .iter()
            .find(|record| record.status == WorkspaceStatus::Failed)
            .map(|record| record.workspace.as_str())
    }

    /// Process exit code: 0 on success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(!self.is_success())
    }

    /// Converts to a dictionary representation for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id.to_string(),
            "action": self.action.as_str(),
            "success": self.is_success(),
            "attempted": self.attempted(),
            "failed_workspace": self.failed_workspace(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> SequenceReport {
        SequenceReport::new(
            Action::Deploy,
            ["a", "b", "c"].into_iter().map(String::from),
        )
    }

    #[test]
    fn test_new_report_is_pending() {
        let report = report();
        assert!(!report.is_success());
        assert!(report.attempted().is_empty());
        assert_eq!(report.failed_workspace(), None);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_success_and_failure() {
        let mut report = report();
        for record in &mut report.records {
            record.status = WorkspaceStatus::Succeeded;
        }
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);

        report.records[1].status = WorkspaceStatus::Failed;
        report.records[2].status = WorkspaceStatus::Pending;
        assert_eq!(report.attempted(), vec!["a", "b"]);
        assert_eq!(report.failed_workspace(), Some("b"));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.to_dict()["failed_workspace"], "b");
    }

    #[test]
    fn test_empty_run_succeeds() {
        let report = SequenceReport::new(Action::Destroy, Vec::new());
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
    }
}
