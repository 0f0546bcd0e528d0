//! Deployment environment tag and the retention rules derived from it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environments whose stateful resources survive stack teardown.
pub const PERSISTENT_ENVIRONMENTS: [&str; 2] = ["production", "develop"];

/// What happens to a stateful resource when its stack is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalPolicy {
    /// Keep the resource and its data.
    #[serde(rename = "Retain")]
    Retain,
    /// Delete the resource with the stack.
    #[serde(rename = "Delete")]
    Destroy,
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retain => write!(f, "retain"),
            Self::Destroy => write!(f, "destroy"),
        }
    }
}

/// A deployment environment tag such as `production`, `develop` or `feature-x`.
///
/// The tag parameterizes resource naming, the removal policy of stateful
/// resources and which output records are consulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentEnvironment(String);

impl DeploymentEnvironment {
    /// Creates a new environment tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the raw tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the tag was never configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true for environments whose data must outlive the stack.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        PERSISTENT_ENVIRONMENTS.contains(&self.0.as_str())
    }

    /// Removal policy for the database, table and bucket.
    #[must_use]
    pub fn removal_policy(&self) -> RemovalPolicy {
        if self.is_persistent() {
            RemovalPolicy::Retain
        } else {
            RemovalPolicy::Destroy
        }
    }

    /// Converts the kebab-case tag to PascalCase (`feature-x` becomes `FeatureX`).
    ///
    /// Used where resource names cannot contain dashes.
    #[must_use]
    pub fn pascal_case(&self) -> String {
        self.0
            .split('-')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect()
    }

    /// Name of the generated database credentials secret.
    #[must_use]
    pub fn database_secret_name(&self) -> String {
        format!("mysqlSecret{}", self.pascal_case())
    }

    /// Name of the generated database user.
    #[must_use]
    pub fn database_user_name(&self) -> String {
        format!("mysqlUser{}", self.pascal_case())
    }

    /// Default database name inside the cluster.
    #[must_use]
    pub fn database_name(&self) -> String {
        format!("AuroraMysql{}", self.pascal_case())
    }
}

impl fmt::Display for DeploymentEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeploymentEnvironment {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistent_environments_retain() {
        for tag in ["production", "develop"] {
            let env = DeploymentEnvironment::new(tag);
            assert!(env.is_persistent());
            assert_eq!(env.removal_policy(), RemovalPolicy::Retain);
        }
    }

    #[test]
    fn test_other_environments_destroy() {
        for tag in ["", "staging", "feature-x", "Production", "develop-2", "dev"] {
            let env = DeploymentEnvironment::new(tag);
            assert!(!env.is_persistent(), "{tag} should be ephemeral");
            assert_eq!(env.removal_policy(), RemovalPolicy::Destroy);
        }
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(DeploymentEnvironment::new("develop").pascal_case(), "Develop");
        assert_eq!(
            DeploymentEnvironment::new("feature-new-login").pascal_case(),
            "FeatureNewLogin"
        );
        assert_eq!(DeploymentEnvironment::new("").pascal_case(), "");
        assert_eq!(DeploymentEnvironment::new("a--b").pascal_case(), "AB");
    }

    #[test]
    fn test_database_names() {
        let env = DeploymentEnvironment::new("feature-x");
        assert_eq!(env.database_secret_name(), "mysqlSecretFeatureX");
        assert_eq!(env.database_user_name(), "mysqlUserFeatureX");
        assert_eq!(env.database_name(), "AuroraMysqlFeatureX");
    }

    #[test]
    fn test_removal_policy_serialize() {
        assert_eq!(serde_json::to_string(&RemovalPolicy::Retain).unwrap(), r#""Retain""#);
        assert_eq!(serde_json::to_string(&RemovalPolicy::Destroy).unwrap(), r#""Delete""#);
    }
}
