//! Error types for stackflow.
//!
//! Hard failures (invalid command, undecodable secret, a workspace step that
//! exits non-zero) surface as [`StackflowError`]. Missing upstream outputs are
//! soft by default and only become [`MissingOutputsError`] under the strict
//! policy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StackflowError>;

/// The main error type for stackflow operations.
#[derive(Debug, Error)]
pub enum StackflowError {
    /// The CLI was given something other than `deploy` or `destroy`.
    #[error(
        "Command provided invalid. Must be either \"deploy\" or \"destroy\". Command provided: {command}"
    )]
    InvalidCommand {
        /// The rejected command word.
        command: String,
    },

    /// The secret payload could not be turned into a structured secret.
    #[error("Failed to decode secret '{name}': {reason}")]
    SecretDecode {
        /// The secret name that was looked up.
        name: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// The secret storage service call failed.
    #[error("Failed to fetch secret '{name}': {message}")]
    SecretFetch {
        /// The secret name that was looked up.
        name: String,
        /// The client error message.
        message: String,
    },

    /// Upstream outputs were missing under the strict policy.
    #[error("{0}")]
    MissingOutputs(#[from] MissingOutputsError),

    /// An output file carries an envelope version this build does not read.
    #[error("Unsupported output record version {found} in {path} (expected {expected})")]
    UnsupportedOutputVersion {
        /// The file that was read.
        path: String,
        /// The version found in the file.
        found: u32,
        /// The version this build writes.
        expected: u32,
    },

    /// A child process exited unsuccessfully.
    #[error("Command '{program}' failed with status {status}: {stderr}")]
    CommandFailed {
        /// The program that was run.
        program: String,
        /// Exit status, or "signal" when killed.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The provisioning step failed for a stack.
    #[error("Provisioning failed for stack '{stack_id}': {message}")]
    Provision {
        /// The stack being provisioned.
        stack_id: String,
        /// What went wrong.
        message: String,
    },

    /// A database error during schema application.
    #[error("Database error: {0}")]
    Database(String),

    /// The database connection did not open in time.
    #[error("Timed out connecting to {host}:{port} after {seconds}s")]
    ConnectTimeout {
        /// Database host.
        host: String,
        /// Database port.
        port: u16,
        /// The timeout that elapsed.
        seconds: u64,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StackflowError {
    /// Creates a secret decode error.
    #[must_use]
    pub fn secret_decode(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SecretDecode {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a provisioning error.
    #[must_use]
    pub fn provision(stack_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provision {
            stack_id: stack_id.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors that a re-run cannot fix without an upstream change.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidCommand { .. }
                | Self::SecretDecode { .. }
                | Self::UnsupportedOutputVersion { .. }
                | Self::Config(_)
        )
    }

    /// Converts to a dictionary representation for event payloads.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let kind = match self {
            Self::InvalidCommand { .. } => "InvalidCommand",
            Self::SecretDecode { .. } => "SecretDecode",
            Self::SecretFetch { .. } => "SecretFetch",
            Self::MissingOutputs(_) => "MissingOutputs",
            Self::UnsupportedOutputVersion { .. } => "UnsupportedOutputVersion",
            Self::CommandFailed { .. } => "CommandFailed",
            Self::Provision { .. } => "Provision",
            Self::Database(_) => "Database",
            Self::ConnectTimeout { .. } => "ConnectTimeout",
            Self::Config(_) => "Config",
            Self::Serialization(_) => "Serialization",
            Self::Io(_) => "Io",
        };

        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("structural".to_string(), serde_json::json!(self.is_structural()));
        map
    }
}

impl From<sqlx::Error> for StackflowError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Error raised when a consuming stack requires outputs its upstream never wrote.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Stack '{stack_id}' is missing outputs: {}", keys.join(", "))]
pub struct MissingOutputsError {
    /// The upstream stack whose record was read.
    pub stack_id: String,
    /// Every expected key that was absent or blank.
    pub keys: Vec<String>,
}

impl MissingOutputsError {
    /// Creates a new missing outputs error.
    #[must_use]
    pub fn new(stack_id: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            stack_id: stack_id.into(),
            keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_command_names_alternatives() {
        let err = StackflowError::InvalidCommand {
            command: "rebuild".to_string(),
        };
        let message = err.to_string();

        assert!(message.contains("rebuild"));
        assert!(message.contains("\"deploy\""));
        assert!(message.contains("\"destroy\""));
    }

    #[test]
    fn test_missing_outputs_lists_every_key() {
        let err = MissingOutputsError::new(
            "develop-infrastructure-stack",
            vec!["vpcId".to_string(), "eventLogArn".to_string()],
        );

        assert_eq!(
            err.to_string(),
            "Stack 'develop-infrastructure-stack' is missing outputs: vpcId, eventLogArn"
        );
    }

    #[test]
    fn test_structural_errors() {
        assert!(StackflowError::secret_decode("s", "empty").is_structural());
        assert!(!StackflowError::provision("stack", "boom").is_structural());
        assert!(!StackflowError::Database("gone".to_string()).is_structural());
    }

    #[test]
    fn test_error_to_dict() {
        let err = StackflowError::secret_decode("mysqlSecretDevelop", "no payload");
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "SecretDecode");
        assert_eq!(dict.get("structural"), Some(&serde_json::json!(true)));
        assert!(dict
            .get("message")
            .unwrap()
            .as_str()
            .unwrap()
            .contains("mysqlSecretDevelop"));
    }
}
