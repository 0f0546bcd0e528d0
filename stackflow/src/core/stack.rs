//! Stack kinds, composite stack identifiers and the fixed deployment order.

use super::DeploymentEnvironment;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The independently deployable stacks, one per workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackKind {
    /// Network, database, event table and bucket.
    Infrastructure,
    /// Long-running container task processor.
    ProcessTasks,
    /// Change-stream driven event processor.
    ProcessEvents,
}

/// Deploy order. Destroy walks it backwards.
///
/// Later stacks read the output records of earlier ones.
pub const DEPLOYMENT_ORDER: [StackKind; 3] = [
    StackKind::Infrastructure,
    StackKind::ProcessTasks,
    StackKind::ProcessEvents,
];

impl StackKind {
    /// Kebab-case slug used in stack identifiers.
    #[must_use]
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Infrastructure => "infrastructure",
            Self::ProcessTasks => "process-tasks",
            Self::ProcessEvents => "process-events",
        }
    }

    /// Workspace directory, relative to the repository root, that owns the stack.
    #[must_use]
    pub fn workspace_dir(&self) -> &'static str {
        match self {
            Self::Infrastructure => "infrastructure",
            Self::ProcessTasks => "services/process_tasks",
            Self::ProcessEvents => "services/process_events",
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Composite stack identifier, rendered as `{environment}-{stack-type}-stack`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackId {
    /// The environment the stack belongs to.
    pub environment: DeploymentEnvironment,
    /// Which stack.
    pub kind: StackKind,
}

impl StackId {
    /// Creates a new stack identifier.
    #[must_use]
    pub fn new(environment: DeploymentEnvironment, kind: StackKind) -> Self {
        Self { environment, kind }
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-stack", self.environment, self.kind.slug())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_id_display() {
        let id = StackId::new(DeploymentEnvironment::new("develop"), StackKind::Infrastructure);
        assert_eq!(id.to_string(), "develop-infrastructure-stack");

        let id = StackId::new(DeploymentEnvironment::new("feature-x"), StackKind::ProcessTasks);
        assert_eq!(id.to_string(), "feature-x-process-tasks-stack");
    }

    #[test]
    fn test_deployment_order_dependencies_first() {
        assert_eq!(DEPLOYMENT_ORDER[0], StackKind::Infrastructure);
        let tasks = DEPLOYMENT_ORDER.iter().position(|k| *k == StackKind::ProcessTasks);
        let events = DEPLOYMENT_ORDER.iter().position(|k| *k == StackKind::ProcessEvents);
        assert!(tasks < events);
    }

    #[test]
    fn test_stack_kind_serialize() {
        let json = serde_json::to_string(&StackKind::ProcessEvents).unwrap();
        assert_eq!(json, r#""process-events""#);
    }
}
