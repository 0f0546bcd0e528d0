//! Output records and the on-disk document that holds them.

use crate::errors::{Result, StackflowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Envelope version written by this build.
pub const OUTPUT_DOCUMENT_VERSION: u32 = 1;

/// Named string outputs of one deployed stack.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputRecord(BTreeMap<String, String>);

impl OutputRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an output, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces an output.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns an output value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the number of outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record holds no outputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over outputs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Builds a record from a JSON object, stringifying non-string values.
    ///
    /// Deploy tools write list outputs (subnet ids) as JSON strings already,
    /// but hand-edited files sometimes carry numbers or arrays.
    #[must_use]
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        let entries = object
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect();
        Self(entries)
    }
}

impl FromIterator<(String, String)> for OutputRecord {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The contents of one output file: every stack record of a stack group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputDocument {
    /// Envelope version.
    pub version: u32,
    /// Records keyed by stack identifier.
    #[serde(default)]
    pub stacks: BTreeMap<String, OutputRecord>,
}

impl OutputDocument {
    /// Creates an empty document at the current version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: OUTPUT_DOCUMENT_VERSION,
            stacks: BTreeMap::new(),
        }
    }

    /// Parses either the versioned envelope or a bare `{stack id: {..}}` mapping.
    ///
    /// `origin` names the source in errors.
    pub fn parse(json: &str, origin: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(root) = value else {
            return Err(StackflowError::Config(format!(
                "Output file {origin} must contain a JSON object"
            )));
        };

        if let Some(version) = root.get("version").and_then(serde_json::Value::as_u64) {
            if root.get("stacks").is_some_and(serde_json::Value::is_object) {
                let found = u32::try_from(version).unwrap_or(u32::MAX);
                if found != OUTPUT_DOCUMENT_VERSION {
                    return Err(StackflowError::UnsupportedOutputVersion {
                        path: origin.to_string(),
                        found,
                        expected: OUTPUT_DOCUMENT_VERSION,
                    });
                }
                return Ok(serde_json::from_value(serde_json::Value::Object(root))?);
            }
        }

        let stacks = root
            .iter()
            .filter_map(|(stack_id, record)| {
                record
                    .as_object()
                    .map(|object| (stack_id.clone(), OutputRecord::from_json_object(object)))
            })
            .collect();

        Ok(Self {
            version: OUTPUT_DOCUMENT_VERSION,
            stacks,
        })
    }
}
