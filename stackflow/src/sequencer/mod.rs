//! Deployment sequencing across workspaces.
//!
//! Workspaces run one at a time in a fixed order. The first failure halts
//! the run; later workspaces are never started. Destroy walks the same list
//! backwards.

mod action;
mod report;
mod runner;
mod workspace;


pub use action::Action;
pub use report::{SequenceReport, WorkspaceRecord};
pub use runner::Sequencer;
pub use workspace::{
    standard_workspaces, PostDeployHook, StackWorkspace, WorkspaceDeps, WorkspaceStep,
};
