//! Hand-off of synthesized manifests to the provisioning engine.

mod command;

pub use command::{CommandProvisioner, STATE_DIR};

use crate::errors::Result;
use crate::outputs::OutputRecord;
use crate::stacks::StackTemplate;
use async_trait::async_trait;
use std::fmt::Debug;

/// Creates, updates and tears down the resources a manifest declares.
///
/// Implementations block until the engine reports completion.
#[async_trait]
pub trait Provisioner: Send + Sync + Debug {
    /// Deploys the manifest and returns the stack's resolved outputs.
    async fn deploy(&self, template: &StackTemplate) -> Result<OutputRecord>;

    /// Tears the stack down.
    async fn destroy(&self, template: &StackTemplate) -> Result<()>;
}
