//! Assertions over sequencer reports.

use crate::core::WorkspaceStatus;
use crate::sequencer::SequenceReport;

/// Asserts that every workspace succeeded.
///
/// # Panics
///
/// Panics if any workspace did not succeed.
pub fn assert_sequence_succeeded(report: &SequenceReport) {
    assert!(
        report.is_success(),
        "Expected a successful run, got failure at {:?}",
        report.failed_workspace()
    );
}

/// Asserts that the run halted at `workspace`, after attempting exactly `attempted`.
///
/// # Panics
///
/// Panics if the run did not fail at the given workspace or attempted others.
pub fn assert_halted_at(report: &SequenceReport, workspace: &str, attempted: &[&str]) {
    assert_eq!(report.failed_workspace(), Some(workspace));
    assert_eq!(report.attempted(), attempted);
    assert_eq!(report.exit_code(), 1);

    let never_run: Vec<&str> = report
        .records
        .iter()
        .filter(|record| record.status == WorkspaceStatus::Pending)
        .map(|record| record.workspace.as_str())
        .collect();
    assert_eq!(
        never_run.len() + attempted.len(),
        report.records.len(),
        "Workspaces after the failure must stay pending"
    );
}
