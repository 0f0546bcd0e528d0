//! Event sink system for deployment diagnostics.
//!
//! Sinks are passed explicitly to the sequencer and to stack definitions; there
//! is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event emitted when a workspace step starts.
pub const WORKSPACE_STARTED: &str = "workspace.started";
/// Event emitted when a workspace step succeeds.
pub const WORKSPACE_SUCCEEDED: &str = "workspace.succeeded";
/// Event emitted when a workspace step fails.
pub const WORKSPACE_FAILED: &str = "workspace.failed";
/// Event emitted when every workspace succeeded.
pub const SEQUENCE_COMPLETED: &str = "sequence.completed";
/// Event emitted when the sequencer stops early.
pub const SEQUENCE_HALTED: &str = "sequence.halted";
/// Event emitted when an upstream output record lacks expected keys.
pub const OUTPUTS_MISSING: &str = "outputs.missing";
/// Event emitted after the schema applicator ran.
pub const SCHEMA_APPLIED: &str = "schema.applied";
