//! Upstream output look-ups for consuming stacks.

use super::contracts::OutputContract;
use super::record::OutputRecord;
use super::store::OutputStore;
use crate::core::{DeploymentEnvironment, StackId};
use crate::errors::{MissingOutputsError, Result};
use crate::events::{EventSink, OUTPUTS_MISSING};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// What a consuming stack does when upstream outputs are absent or blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingOutputPolicy {
    /// Log a diagnostic naming every missing key and continue with blanks.
    #[default]
    Warn,
    /// Refuse to continue.
    Fail,
}

/// The expected outputs of one upstream stack, blanks substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    stack_id: String,
    values: BTreeMap<String, String>,
    missing: Vec<String>,
}

impl ResolvedOutputs {
    /// The upstream stack the values came from.
    #[must_use]
    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    /// Returns the value for an expected key; empty if it was missing.
    ///
    /// Keys outside the expected set also read as empty.
    #[must_use]
    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map_or("", String::as_str)
    }

    /// Expected keys that were absent or blank, in expectation order.
    #[must_use]
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Returns true if every expected key had a value.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Reads an upstream record and checks it against the expected keys.
///
/// Each absent or blank key resolves to `""`. Under
/// [`MissingOutputPolicy::Warn`] one diagnostic lists every missing key and the
/// call succeeds; under [`MissingOutputPolicy::Fail`] it returns
/// [`MissingOutputsError`].
pub fn resolve(
    store: &dyn OutputStore,
    stack_id: &StackId,
    expected: &[&str],
    policy: MissingOutputPolicy,
    sink: &dyn EventSink,
) -> Result<ResolvedOutputs> {
    let record = store.read(stack_id)?;
    let resolved = check(&stack_id.to_string(), &record, expected);

    if resolved.is_complete() {
        return Ok(resolved);
    }

    match policy {
        MissingOutputPolicy::Warn => {
            let listing = resolved
                .missing
                .iter()
                .map(|key| format!("\n    - {key}: \"\""))
                .collect::<String>();
            warn!(
                stack_id = %resolved.stack_id,
                missing = ?resolved.missing,
                "Something is missing from upstream outputs, continuing with blank values:{}",
                listing
            );
            sink.emit(
                OUTPUTS_MISSING,
                Some(serde_json::json!({
                    "stack_id": resolved.stack_id,
                    "missing": resolved.missing,
                })),
            );
            Ok(resolved)
        }
        MissingOutputPolicy::Fail => {
            Err(MissingOutputsError::new(resolved.stack_id, resolved.missing).into())
        }
    }
}

/// Resolves an upstream record straight into a typed contract.
///
/// The upstream stack is the contract's source in the given environment.
pub fn resolve_contract<C: OutputContract>(
    store: &dyn OutputStore,
    environment: &DeploymentEnvironment,
    policy: MissingOutputPolicy,
    sink: &dyn EventSink,
) -> Result<C> {
    let stack_id = StackId::new(environment.clone(), C::SOURCE);
    let resolved = resolve(store, &stack_id, C::KEYS, policy, sink)?;
    Ok(C::from_resolved(&resolved))
}

fn check(stack_id: &str, record: &OutputRecord, expected: &[&str]) -> ResolvedOutputs {
    let mut values = BTreeMap::new();
    let mut missing = Vec::new();

    for key in expected {
        let value = record.get(key).unwrap_or_default();
        if value.trim().is_empty() {
            missing.push((*key).to_string());
        }
        values.insert((*key).to_string(), value.to_string());
    }

    ResolvedOutputs {
        stack_id: stack_id.to_string(),
        values,
        missing,
    }
}
