//! Testing utilities for stackflow sequences.
//!
//! This module provides:
//! - Mock workspace steps, provisioners and post-deploy hooks
//! - Assertions over sequence reports

mod assertions;
mod mocks;

pub use assertions::{assert_halted_at, assert_sequence_succeeded};
pub use mocks::{CallLog, FailingStep, RecordingHook, RecordingStep, StaticProvisioner};
