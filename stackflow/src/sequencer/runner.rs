//! Strictly sequential, fail-fast execution of workspace steps.

use super::report::SequenceReport;
use super::{Action, WorkspaceStep};
use crate::core::WorkspaceStatus;
use crate::errors::Result;
use crate::events::{
    EventSink, SEQUENCE_COMPLETED, SEQUENCE_HALTED, WORKSPACE_FAILED, WORKSPACE_STARTED,
    WORKSPACE_SUCCEEDED,
};
use crate::observability::{workspace_span, WorkspaceSpanAttributes};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, Instrument};

/// Runs workspaces one at a time, stopping at the first failure.
///
/// Deploy visits the steps in the order given; destroy visits them in reverse.
#[derive(Clone)]
pub struct Sequencer {
    steps: Vec<Arc<dyn WorkspaceStep>>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("steps", &self.workspaces())
            .finish_non_exhaustive()
    }
}

impl Sequencer {
    /// Creates a sequencer over steps in deployment order.
    #[must_use]
    pub fn new(steps: Vec<Arc<dyn WorkspaceStep>>, sink: Arc<dyn EventSink>) -> Self {
        Self { steps, sink }
    }

    /// Workspace names in deployment order.
    #[must_use]
    pub fn workspaces(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.workspace()).collect()
    }

    /// Parses a command word and runs it.
    pub async fn run_command(&self, command: &str) -> Result<SequenceReport> {
        let action = command.parse::<Action>()?;
        Ok(self.run(action).await)
    }

    /// Runs every workspace for the action.
    ///
    /// Failures are recorded in the report, never returned.
    pub async fn run(&self, action: Action) -> SequenceReport {
        let steps = action.order(&self.steps);
        let mut report = SequenceReport::new(
            action,
            steps.iter().map(|step| step.workspace().to_string()),
        );
        let run_id = report.run_id.to_string();

        for (index, step) in steps.iter().enumerate() {
            let workspace = step.workspace();
            info!("{}", action.starting_line(workspace));

            report.records[index].status = WorkspaceStatus::Running;
            report.records[index].started_at = Some(Utc::now());
            self.sink.emit(
                WORKSPACE_STARTED,
                Some(serde_json::json!({
                    "run_id": run_id,
                    "workspace": workspace,
                    "action": action.as_str(),
                })),
            );

            let started = Instant::now();
            let result = match action {
                Action::Deploy => step.deploy(self.sink.as_ref()),
                Action::Destroy => step.destroy(self.sink.as_ref()),
            }
            .instrument(workspace_span(&run_id, workspace, action.as_str()))
            .await;
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            let record = &mut report.records[index];
            record.finished_at = Some(Utc::now());

            match result {
                Ok(()) => {
                    record.status = WorkspaceStatus::Succeeded;
                    info!("{}", action.ending_line(workspace));
                    let attrs = WorkspaceSpanAttributes::new(workspace)
                        .with_run_id(run_id.as_str())
                        .with_action(action.as_str())
                        .with_status(record.status.to_string())
                        .with_duration_ms(duration_ms);
                    self.sink
                        .emit(WORKSPACE_SUCCEEDED, Some(serde_json::json!(attrs.to_attributes())));
                }
                Err(e) => {
                    record.status = WorkspaceStatus::Failed;
                    record.error = Some(e.to_string());
                    error!(workspace = workspace, error = %e, "Workspace step failed");
                    error!(
                        "Failed to {} {}. Stopping further {}s.",
                        action.as_str(),
                        workspace,
                        action.noun()
                    );
                    self.sink.emit(
                        WORKSPACE_FAILED,
                        Some(serde_json::json!({
                            "run_id": run_id,
                            "workspace": workspace,
                            "action": action.as_str(),
                            "error": e.to_dict(),
                            "duration_ms": duration_ms,
                        })),
                    );

                    report.finished_at = Some(Utc::now());
                    self.sink.emit(SEQUENCE_HALTED, Some(report.to_dict()));
                    return report;
                }
            }
        }

        report.finished_at = Some(Utc::now());
        info!("All workspaces {} successfully!", action.past());
        self.sink.emit(SEQUENCE_COMPLETED, Some(report.to_dict()));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::testing::{CallLog, RecordingStep};
    use parking_lot::Mutex;
    use std::io;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_progress_lines_bracket_each_success() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let log = CallLog::new();
        let steps: Vec<Arc<dyn WorkspaceStep>> = vec![
            Arc::new(RecordingStep::new("a", log.clone())),
            Arc::new(RecordingStep::new("b", log.clone()).failing("rolled back")),
        ];
        Sequencer::new(steps, Arc::new(CollectingEventSink::new()))
            .run(Action::Deploy)
            .await;

        let text = logs.text();
        let position = |needle: &str| {
            text.find(needle)
                .unwrap_or_else(|| panic!("{needle:?} not logged in:\n{text}"))
        };
        assert!(position(">>> Starting deployment for: a") < position(">>> Ending deployment for: a"));
        assert!(position(">>> Ending deployment for: a") < position(">>> Starting deployment for: b"));
        assert!(position(">>> Starting deployment for: b") < position("Failed to deploy b. Stopping further deployments."));
        assert!(!text.contains(">>> Ending deployment for: b"));
        assert!(!text.contains("All workspaces deployed successfully!"));
    }
}
