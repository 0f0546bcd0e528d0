//! Workspace steps: one deployable unit each.

use crate::config::Settings;
use crate::core::{DeploymentEnvironment, DEPLOYMENT_ORDER};
use crate::errors::Result;
use crate::events::EventSink;
use crate::outputs::{OutputRecord, OutputStore};
use crate::provision::Provisioner;
use crate::stacks::{definition_for, StackContext, StackDefinition};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Work to run once a stack has deployed and its outputs are recorded.
#[async_trait]
pub trait PostDeployHook: Send + Sync + Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Runs after a successful deploy. An error fails the workspace.
    async fn after_deploy(
        &self,
        environment: &DeploymentEnvironment,
        outputs: &OutputRecord,
        sink: &dyn EventSink,
    ) -> Result<()>;
}

/// A unit the sequencer deploys or destroys.
#[async_trait]
pub trait WorkspaceStep: Send + Sync + Debug {
    /// Workspace name, as shown in progress lines.
    fn workspace(&self) -> &str;

    /// Creates or updates the workspace's resources.
    async fn deploy(&self, sink: &dyn EventSink) -> Result<()>;

    /// Tears the workspace's resources down.
    async fn destroy(&self, sink: &dyn EventSink) -> Result<()>;
}

/// A workspace backed by one stack definition.
#[derive(Debug, Clone)]
pub struct StackWorkspace {
    definition: Arc<dyn StackDefinition>,
    context: StackContext,
    store: Arc<dyn OutputStore>,
    provisioner: Arc<dyn Provisioner>,
    hooks: Vec<Arc<dyn PostDeployHook>>,
}

impl StackWorkspace {
    /// Creates a workspace for a stack definition.
    #[must_use]
    pub fn new(
        definition: Arc<dyn StackDefinition>,
        context: StackContext,
        store: Arc<dyn OutputStore>,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        Self {
            definition,
            context,
            store,
            provisioner,
            hooks: Vec::new(),
        }
    }

    /// Adds a hook that runs after every successful deploy.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn PostDeployHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Names of the attached hooks, in run order.
    #[must_use]
    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }
}

#[async_trait]
impl WorkspaceStep for StackWorkspace {
    fn workspace(&self) -> &str {
        self.definition.kind().workspace_dir()
    }

    #[instrument(skip_all, fields(stack = %self.definition.kind()))]
    async fn deploy(&self, sink: &dyn EventSink) -> Result<()> {
        let template = self.definition.synthesize(&self.context, self.store.as_ref(), sink)?;
        let stack_id = self.context.stack_id(self.definition.kind());

        let outputs = self.provisioner.deploy(&template).await?;
        self.store.write(&stack_id, &outputs)?;
        info!(stack_id = %stack_id, outputs = outputs.len(), "Recorded stack outputs");

        for hook in &self.hooks {
            debug!(hook = hook.name(), "Running post-deploy hook");
            hook.after_deploy(self.context.environment(), &outputs, sink)
                .await?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(stack = %self.definition.kind()))]
    async fn destroy(&self, sink: &dyn EventSink) -> Result<()> {
        let template = self.definition.synthesize(&self.context, self.store.as_ref(), sink)?;
        let stack_id = self.context.stack_id(self.definition.kind());

        self.provisioner.destroy(&template).await?;
        self.store.remove(&stack_id)?;
        info!(stack_id = %stack_id, "Removed stack outputs");
        Ok(())
    }
}

/// Everything the standard workspaces share.
#[derive(Debug, Clone)]
pub struct WorkspaceDeps {
    /// Process-wide settings.
    pub settings: Arc<Settings>,
    /// Where outputs are handed between stacks.
    pub store: Arc<dyn OutputStore>,
    /// The provisioning engine.
    pub provisioner: Arc<dyn Provisioner>,
    /// Hook attached to the infrastructure workspace, normally the schema migration.
    pub infrastructure_hook: Option<Arc<dyn PostDeployHook>>,
}

/// The three stack workspaces in deployment order.
#[must_use]
pub fn standard_workspaces(deps: WorkspaceDeps) -> Vec<Arc<dyn WorkspaceStep>> {
    let context = StackContext::new(Arc::clone(&deps.settings));

    DEPLOYMENT_ORDER
        .iter()
        .enumerate()
        .map(|(index, kind)| {
            let mut workspace = StackWorkspace::new(
                definition_for(*kind),
                context.clone(),
                Arc::clone(&deps.store),
                Arc::clone(&deps.provisioner),
            );
            if index == 0 {
                if let Some(hook) = &deps.infrastructure_hook {
                    workspace = workspace.with_hook(Arc::clone(hook));
                }
            }
            Arc::new(workspace) as Arc<dyn WorkspaceStep>
        })
        .collect()
}
