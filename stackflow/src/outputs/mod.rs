//! Cross-stack output hand-off.
//!
//! This module provides:
//! - The output record written after each successful stack deployment
//! - File-backed and in-memory output stores
//! - Upstream look-ups with warn-or-fail handling of missing keys
//! - Typed contracts for the outputs each consuming stack expects

mod contracts;
mod lookup;
mod record;
mod store;

pub use contracts::{
    EventsInfrastructureOutputs, OutputContract, TaskProcessorOutputs,
    TasksInfrastructureOutputs,
};
pub use lookup::{resolve, resolve_contract, MissingOutputPolicy, ResolvedOutputs};
pub use record::{OutputDocument, OutputRecord, OUTPUT_DOCUMENT_VERSION};
pub use store::{FileOutputStore, MemoryOutputStore, OutputStore, OUTPUTS_FILE_NAME};
