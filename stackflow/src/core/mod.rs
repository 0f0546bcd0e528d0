//! Core domain model types for stackflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Deployment environment and its removal policy
//! - Stack kinds, stack identifiers and the fixed deployment order
//! - Workspace status

mod environment;
mod stack;
mod status;

pub use environment::{DeploymentEnvironment, RemovalPolicy, PERSISTENT_ENVIRONMENTS};
pub use stack::{StackId, StackKind, DEPLOYMENT_ORDER};
pub use status::WorkspaceStatus;
