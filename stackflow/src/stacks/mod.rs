//! Stack definitions: declarative manifests of each independently deployable
//! stack.
//!
//! A definition reads upstream output records, never live cloud state, and
//! produces a [`StackTemplate`] for the provisioning engine.

mod infrastructure;
mod process_events;
mod process_tasks;
pub mod resources;
mod template;

pub use infrastructure::InfrastructureStack;
pub use process_events::ProcessEventsStack;
pub use process_tasks::ProcessTasksStack;
pub use resources::{Resource, ValueRef};
pub use template::{StackOutput, StackTemplate};

use crate::config::{Settings, ENV_LIBRARY_TOKEN};
use crate::core::{DeploymentEnvironment, StackId, StackKind};
use crate::errors::Result;
use crate::events::EventSink;
use crate::outputs::{MissingOutputPolicy, OutputStore};
use resources::DockerImage;
use std::fmt::Debug;
use std::sync::Arc;

/// Docker build argument carrying the source-control token.
pub const LIBRARY_TOKEN_BUILD_ARG: &str = "LIBRARY_TOKEN_GITHUB";

/// Inputs shared by every stack definition.
#[derive(Debug, Clone)]
pub struct StackContext {
    settings: Arc<Settings>,
}

impl StackContext {
    /// Creates a context over resolved settings.
    #[must_use]
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// The resolved settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The deployment environment.
    #[must_use]
    pub fn environment(&self) -> &DeploymentEnvironment {
        &self.settings.environment
    }

    /// Missing upstream output handling.
    #[must_use]
    pub fn missing_outputs(&self) -> MissingOutputPolicy {
        self.settings.missing_outputs
    }

    /// Identifier of a stack in this environment.
    #[must_use]
    pub fn stack_id(&self, kind: StackKind) -> StackId {
        StackId::new(self.settings.environment.clone(), kind)
    }

    /// An empty manifest for a stack in this environment.
    #[must_use]
    pub fn template(&self, kind: StackKind) -> StackTemplate {
        StackTemplate::new(
            &self.stack_id(kind),
            self.settings.account.clone(),
            self.settings.region.clone(),
        )
    }

    /// The service image built from the workspace's `service_code` directory.
    #[must_use]
    pub fn service_image(&self) -> DockerImage {
        DockerImage {
            directory: "./service_code".to_string(),
            platform: "linux/amd64".to_string(),
            build_args_from_env: [(
                LIBRARY_TOKEN_BUILD_ARG.to_string(),
                ENV_LIBRARY_TOKEN.to_string(),
            )]
            .into_iter()
            .collect(),
        }
    }
}

/// One independently deployable stack.
pub trait StackDefinition: Send + Sync + Debug {
    /// Which stack this defines.
    fn kind(&self) -> StackKind;

    /// Builds the manifest, reading upstream outputs from the store.
    ///
    /// Missing upstream values follow the context's policy: blank plus a
    /// diagnostic, or an error.
    fn synthesize(
        &self,
        ctx: &StackContext,
        store: &dyn OutputStore,
        sink: &dyn EventSink,
    ) -> Result<StackTemplate>;
}

/// The definition for a stack kind.
#[must_use]
pub fn definition_for(kind: StackKind) -> Arc<dyn StackDefinition> {
    match kind {
        StackKind::Infrastructure => Arc::new(InfrastructureStack),
        StackKind::ProcessTasks => Arc::new(ProcessTasksStack),
        StackKind::ProcessEvents => Arc::new(ProcessEventsStack),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::StackContext;
    use crate::config::Settings;
    use crate::core::DeploymentEnvironment;
    use crate::outputs::MissingOutputPolicy;
    use std::sync::Arc;

    pub fn context(env: &str) -> StackContext {
        context_with_policy(env, MissingOutputPolicy::Warn)
    }

    pub fn context_with_policy(env: &str, policy: MissingOutputPolicy) -> StackContext {
        StackContext::new(Arc::new(Settings {
            environment: DeploymentEnvironment::new(env),
            account: "123456789012".to_string(),
            region: "us-west-2".to_string(),
            allow_list_ips: vec!["203.0.113.7/32".to_string(), "198.51.100.0/24".to_string()],
            missing_outputs: policy,
            ..Settings::default()
        }))
    }
}
