//! Mock steps, provisioners and hooks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::DeploymentEnvironment;
use crate::errors::{Result, StackflowError};
use crate::events::EventSink;
use crate::outputs::OutputRecord;
use crate::provision::Provisioner;
use crate::sequencer::{PostDeployHook, WorkspaceStep};
use crate::stacks::StackTemplate;

/// Ordered log of calls shared between several mocks.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns every entry so far.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// A step that logs `deploy {name}` / `destroy {name}` and optionally fails.
#[derive(Debug)]
pub struct RecordingStep {
    name: String,
    log: CallLog,
    failure: Option<String>,
}

impl RecordingStep {
    /// Creates a succeeding step writing to the shared log.
    #[must_use]
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            log,
            failure: None,
        }
    }

    /// Makes both actions fail with the message after logging the call.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    fn outcome(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(StackflowError::provision(&self.name, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WorkspaceStep for RecordingStep {
    fn workspace(&self) -> &str {
        &self.name
    }

    async fn deploy(&self, _sink: &dyn EventSink) -> Result<()> {
        self.log.push(format!("deploy {}", self.name));
        self.outcome()
    }

    async fn destroy(&self, _sink: &dyn EventSink) -> Result<()> {
        self.log.push(format!("destroy {}", self.name));
        self.outcome()
    }
}

/// A step that always fails without side effects.
#[derive(Debug)]
pub struct FailingStep {
    name: String,
    error: String,
}

impl FailingStep {
    /// Creates a new failing step.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
impl WorkspaceStep for FailingStep {
    fn workspace(&self) -> &str {
        &self.name
    }

    async fn deploy(&self, _sink: &dyn EventSink) -> Result<()> {
        Err(StackflowError::provision(&self.name, &self.error))
    }

    async fn destroy(&self, _sink: &dyn EventSink) -> Result<()> {
        Err(StackflowError::provision(&self.name, &self.error))
    }
}

/// A provisioner that returns a fixed record and logs each call.
#[derive(Debug)]
pub struct StaticProvisioner {
    outputs: OutputRecord,
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl StaticProvisioner {
    /// Creates a provisioner whose deploys return `outputs`.
    #[must_use]
    pub fn new(outputs: OutputRecord) -> Self {
        Self {
            outputs,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a provisioner whose every call fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outputs: OutputRecord::new(),
            failure: Some(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns `deploy {stack id}` / `destroy {stack id}` entries, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn check(&self, template: &StackTemplate) -> Result<()> {
        match &self.failure {
            Some(message) => Err(StackflowError::provision(&template.stack_id, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provisioner for StaticProvisioner {
    async fn deploy(&self, template: &StackTemplate) -> Result<OutputRecord> {
        self.calls.lock().push(format!("deploy {}", template.stack_id));
        self.check(template)?;
        Ok(self.outputs.clone())
    }

    async fn destroy(&self, template: &StackTemplate) -> Result<()> {
        self.calls.lock().push(format!("destroy {}", template.stack_id));
        self.check(template)
    }
}

/// A post-deploy hook that records the environment and output count it saw.
#[derive(Debug)]
pub struct RecordingHook {
    name: String,
    failure: Option<String>,
    seen: Mutex<Vec<(String, usize)>>,
}

impl RecordingHook {
    /// Creates a succeeding hook.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Makes the hook fail after recording the call.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Returns `(environment, output count)` for each call.
    #[must_use]
    pub fn seen(&self) -> Vec<(String, usize)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl PostDeployHook for RecordingHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn after_deploy(
        &self,
        environment: &DeploymentEnvironment,
        outputs: &OutputRecord,
        _sink: &dyn EventSink,
    ) -> Result<()> {
        self.seen
            .lock()
            .push((environment.to_string(), outputs.len()));
        match &self.failure {
            Some(message) => Err(StackflowError::Database(message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoOpEventSink;

    #[tokio::test]
    async fn test_recording_step_logs_calls() {
        let log = CallLog::new();
        let step = RecordingStep::new("a", log.clone());
        step.deploy(&NoOpEventSink).await.unwrap();
        step.destroy(&NoOpEventSink).await.unwrap();
        assert_eq!(log.entries(), vec!["deploy a", "destroy a"]);
    }

    #[tokio::test]
    async fn test_failing_recording_step_still_logs() {
        let log = CallLog::new();
        let step = RecordingStep::new("a", log.clone()).failing("boom");
        assert!(step.deploy(&NoOpEventSink).await.is_err());
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_step() {
        let step = FailingStep::new("a", "nope");
        let err = step.deploy(&NoOpEventSink).await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
