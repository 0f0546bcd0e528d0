//! The two actions the sequencer understands.

use crate::errors::StackflowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do with every workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Create or update, in deployment order.
    Deploy,
    /// Tear down, in reverse deployment order.
    Destroy,
}

impl Action {
    /// The command word.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Destroy => "destroy",
        }
    }

    /// Noun used in progress lines.
    #[must_use]
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Deploy => "deployment",
            Self::Destroy => "destruction",
        }
    }

    /// Past participle used in progress lines.
    #[must_use]
    pub fn past(&self) -> &'static str {
        match self {
            Self::Deploy => "deployed",
            Self::Destroy => "destroyed",
        }
    }

    /// Line logged before a workspace runs.
    #[must_use]
    pub fn starting_line(&self, workspace: &str) -> String {
        format!(">>> Starting {} for: {workspace}", self.noun())
    }

    /// Line logged after a workspace succeeds.
    #[must_use]
    pub fn ending_line(&self, workspace: &str) -> String {
        format!(">>> Ending {} for: {workspace}", self.noun())
    }

    /// Orders items for this action: as given for deploy, reversed for destroy.
    #[must_use]
    pub fn order<T: Clone>(&self, items: &[T]) -> Vec<T> {
        match self {
            Self::Deploy => items.to_vec(),
            Self::Destroy => items.iter().rev().cloned().collect(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = StackflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deploy" => Ok(Self::Deploy),
            "destroy" => Ok(Self::Destroy),
            other => Err(StackflowError::InvalidCommand {
                command: other.to_string(),
            }),
        }
    }
}
