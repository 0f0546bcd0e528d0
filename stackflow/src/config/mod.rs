//! Process-wide configuration read from environment variables.
//!
//! Missing values are not fatal: they propagate as empty strings into the
//! stack definitions, and one warning lists every unset variable.

mod allow_list;

pub use allow_list::parse_allow_list;

use crate::core::DeploymentEnvironment;
use crate::outputs::MissingOutputPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

/// Deployment environment tag.
pub const ENV_DEPLOYMENT_ENVIRONMENT: &str = "DEPLOYMENT_ENVIRONMENT";
/// Cloud account identifier.
pub const ENV_AWS_ACCOUNT: &str = "AWS_ACCOUNT";
/// Cloud region.
pub const ENV_AWS_REGION: &str = "AWS_REGION";
/// Comma-separated partner IP allow-list.
pub const ENV_ALLOW_LIST_IPS: &str = "ALLOW_LIST_IPS";
/// Source-control access token passed to container image builds.
pub const ENV_LIBRARY_TOKEN: &str = "GITHUB_LIBRARY_TOKEN";
/// Repository root holding the workspace directories.
pub const ENV_WORKDIR: &str = "STACKFLOW_WORKDIR";
/// `true` makes missing upstream outputs fatal.
pub const ENV_STRICT_OUTPUTS: &str = "STACKFLOW_STRICT_OUTPUTS";
/// Program that provisions synthesized stacks.
pub const ENV_DEPLOY_PROGRAM: &str = "STACKFLOW_DEPLOY_PROGRAM";

/// Region used for the secrets client when none is configured.
pub const DEFAULT_REGION: &str = "us-west-2";

/// The external tool that provisions one workspace's stack.
///
/// Arguments and `outputs_file` may contain `{workspace}`, `{stack}`,
/// `{template}` and `{outputs}` placeholders. The default runs each
/// workspace's own `cdk:deploy` / `cdk:destroy` script through npm from the
/// repository root, and reads the outputs cdk writes next to the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTool {
    /// Program to execute.
    pub program: String,
    /// Arguments for a deploy.
    pub deploy_args: Vec<String>,
    /// Arguments for a destroy.
    pub destroy_args: Vec<String>,
    /// Outputs file the tool writes on deploy, relative to the repository root.
    pub outputs_file: String,
}

/// Program used when `STACKFLOW_DEPLOY_PROGRAM` is unset.
pub const DEFAULT_DEPLOY_PROGRAM: &str = "npm";
/// Outputs written by each workspace's `cdk:deploy` script.
pub const DEFAULT_OUTPUTS_FILE: &str = "{workspace}/cdk-outputs.json";

impl Default for DeployTool {
    fn default() -> Self {
        Self::new(DEFAULT_DEPLOY_PROGRAM)
    }
}

impl DeployTool {
    /// Creates a tool invocation with the npm workspace argument layout.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        let args = |list: &[&str]| list.iter().map(|s| (*s).to_string()).collect();
        Self {
            program: program.into(),
            deploy_args: args(&["run", "cdk:deploy", "--workspace={workspace}"]),
            destroy_args: args(&["run", "cdk:destroy", "--workspace={workspace}"]),
            outputs_file: DEFAULT_OUTPUTS_FILE.to_string(),
        }
    }
}

/// A string that never appears in logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Redacted(String);

impl Redacted {
    /// Wraps a sensitive value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the wrapped value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if no value was provided.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("\"***\"")
        }
    }
}

/// Resolved process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Deployment environment tag.
    pub environment: DeploymentEnvironment,
    /// Cloud account identifier.
    pub account: String,
    /// Cloud region.
    pub region: String,
    /// Partner CIDRs granted database access.
    pub allow_list_ips: Vec<String>,
    /// Source-control token for container image builds.
    pub library_token: Redacted,
    /// Repository root.
    pub workdir: PathBuf,
    /// Handling of missing upstream outputs.
    pub missing_outputs: MissingOutputPolicy,
    /// Provisioning tool.
    pub deploy_tool: DeployTool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: DeploymentEnvironment::default(),
            account: String::new(),
            region: String::new(),
            allow_list_ips: Vec::new(),
            library_token: Redacted::default(),
            workdir: PathBuf::from("."),
            missing_outputs: MissingOutputPolicy::Warn,
            deploy_tool: DeployTool::default(),
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let unset: Vec<&str> = [
            ENV_DEPLOYMENT_ENVIRONMENT,
            ENV_AWS_ACCOUNT,
            ENV_AWS_REGION,
            ENV_LIBRARY_TOKEN,
        ]
        .into_iter()
        .filter(|key| read(*key).is_empty())
        .collect();

        if !unset.is_empty() {
            warn!(
                unset = ?unset,
                "Environment variables are not set; resource definitions will carry empty values"
            );
        }

        let workdir = read(ENV_WORKDIR);
        let program = read(ENV_DEPLOY_PROGRAM);

        Self {
            environment: DeploymentEnvironment::new(read(ENV_DEPLOYMENT_ENVIRONMENT)),
            account: read(ENV_AWS_ACCOUNT),
            region: read(ENV_AWS_REGION),
            allow_list_ips: parse_allow_list(&read(ENV_ALLOW_LIST_IPS)),
            library_token: Redacted::new(read(ENV_LIBRARY_TOKEN)),
            workdir: if workdir.is_empty() {
                PathBuf::from(".")
            } else {
                PathBuf::from(workdir)
            },
            missing_outputs: if read(ENV_STRICT_OUTPUTS).eq_ignore_ascii_case("true") {
                MissingOutputPolicy::Fail
            } else {
                MissingOutputPolicy::Warn
            },
            deploy_tool: if program.is_empty() {
                DeployTool::default()
            } else {
                DeployTool::new(program)
            },
        }
    }

    /// Region for service clients, falling back to [`DEFAULT_REGION`].
    #[must_use]
    pub fn client_region(&self) -> &str {
        if self.region.is_empty() {
            DEFAULT_REGION
        } else {
            &self.region
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_settings_from_lookup() {
        let settings = Settings::from_lookup(lookup(&[
            ("DEPLOYMENT_ENVIRONMENT", "develop"),
            ("AWS_ACCOUNT", "123456789012"),
            ("AWS_REGION", "eu-west-1"),
            ("ALLOW_LIST_IPS", "203.0.113.7,,198.51.100.0/24"),
            ("GITHUB_LIBRARY_TOKEN", "ghp_secret"),
        ]));

        assert_eq!(settings.environment.as_str(), "develop");
        assert_eq!(settings.account, "123456789012");
        assert_eq!(settings.client_region(), "eu-west-1");
        assert_eq!(
            settings.allow_list_ips,
            vec!["203.0.113.7/32".to_string(), "198.51.100.0/24".to_string()]
        );
        assert_eq!(settings.library_token.expose(), "ghp_secret");
        assert_eq!(settings.missing_outputs, MissingOutputPolicy::Warn);
        assert_eq!(settings.deploy_tool.program, "npm");
        assert_eq!(
            settings.deploy_tool.deploy_args,
            vec!["run", "cdk:deploy", "--workspace={workspace}"]
        );
        assert_eq!(settings.deploy_tool.outputs_file, "{workspace}/cdk-outputs.json");
    }

    #[test]
    fn test_missing_values_become_empty() {
        let settings = Settings::from_lookup(lookup(&[]));

        assert!(settings.environment.is_empty());
        assert!(settings.account.is_empty());
        assert!(settings.allow_list_ips.is_empty());
        assert_eq!(settings.client_region(), DEFAULT_REGION);
        assert_eq!(settings.workdir, PathBuf::from("."));
    }

    #[test]
    fn test_strict_outputs_and_program() {
        let settings = Settings::from_lookup(lookup(&[
            ("STACKFLOW_STRICT_OUTPUTS", "TRUE"),
            ("STACKFLOW_DEPLOY_PROGRAM", "npx"),
            ("STACKFLOW_WORKDIR", "/srv/repo"),
        ]));

        assert_eq!(settings.missing_outputs, MissingOutputPolicy::Fail);
        assert_eq!(settings.deploy_tool.program, "npx");
        assert_eq!(settings.deploy_tool.deploy_args[1], "cdk:deploy");
        assert_eq!(settings.deploy_tool.destroy_args[1], "cdk:destroy");
        assert_eq!(settings.workdir, PathBuf::from("/srv/repo"));
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let settings = Settings::from_lookup(lookup(&[("GITHUB_LIBRARY_TOKEN", "ghp_secret")]));
        let debug = format!("{settings:?}");

        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("***"));
    }
}
