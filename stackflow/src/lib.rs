//! # Stackflow
//!
//! Sequenced deployment of independently deployable cloud stacks.
//!
//! Stackflow provides the glue around a cloud provider's provisioning engine:
//!
//! - **Stack definitions**: declarative resource manifests for the network,
//!   database, event table, bucket and compute stacks
//! - **Output store**: file-backed hand-off of resource identifiers between stacks
//! - **Credential resolution**: structured database secrets from secret storage
//! - **Schema application**: one-shot, create-if-absent table setup
//! - **Deployment sequencing**: fixed-order, fail-fast deploy and reverse destroy
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stackflow::prelude::*;
//!
//! let settings = Arc::new(Settings::from_env());
//! let sequencer = Sequencer::new(standard_workspaces(deps), sink);
//! let report = sequencer.run(Action::Deploy).await;
//! let code = std::process::ExitCode::from(report.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod outputs;
pub mod provision;
pub mod schema;
pub mod secrets;
pub mod sequencer;
pub mod stacks;
pub mod stream;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DeployTool, Settings};
    pub use crate::core::{
        DeploymentEnvironment, RemovalPolicy, StackId, StackKind, WorkspaceStatus,
        DEPLOYMENT_ORDER,
    };
    pub use crate::errors::{MissingOutputsError, Result, StackflowError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::outputs::{
        FileOutputStore, MemoryOutputStore, MissingOutputPolicy, OutputRecord, OutputStore,
        ResolvedOutputs,
    };
    pub use crate::provision::{CommandProvisioner, Provisioner};
    pub use crate::schema::{SchemaApplicator, SchemaMigration, SchemaSession, SessionConnector};
    pub use crate::secrets::{CredentialResolver, RdsSecret, SecretPayload, SecretsClient};
    pub use crate::sequencer::{
        standard_workspaces, Action, SequenceReport, Sequencer, StackWorkspace,
        WorkspaceDeps, WorkspaceStep,
    };
    pub use crate::stacks::{StackContext, StackDefinition, StackTemplate};
    pub use std::sync::Arc;
}
