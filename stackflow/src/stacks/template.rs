//! Synthesized stack manifests.

use super::resources::{Resource, ValueRef};
use crate::core::{DeploymentEnvironment, StackId, StackKind};
use crate::errors::{Result, StackflowError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A declared stack output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    /// Where the value comes from.
    pub value: ValueRef,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The declarative manifest a stack definition produces.
///
/// The manifest never contains secret values; build arguments name the
/// environment variable to read at build time instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackTemplate {
    /// Stack identifier.
    pub stack_id: String,
    /// Which stack this is.
    pub kind: StackKind,
    /// Deployment environment.
    pub environment: DeploymentEnvironment,
    /// Target account.
    pub account: String,
    /// Target region.
    pub region: String,
    /// Resources by logical id.
    pub resources: BTreeMap<String, Resource>,
    /// Outputs by key.
    pub outputs: BTreeMap<String, StackOutput>,
}

impl StackTemplate {
    /// Creates an empty manifest for the stack.
    #[must_use]
    pub fn new(id: &StackId, account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            stack_id: id.to_string(),
            kind: id.kind,
            environment: id.environment.clone(),
            account: account.into(),
            region: region.into(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Adds a resource, returning its logical id for references.
    pub fn add(&mut self, logical_id: impl Into<String>, resource: Resource) -> String {
        let logical_id = logical_id.into();
        self.resources.insert(logical_id.clone(), resource);
        logical_id
    }

    /// Declares an output.
    pub fn output(&mut self, key: impl Into<String>, value: ValueRef) {
        self.outputs.insert(
            key.into(),
            StackOutput {
                value,
                description: None,
            },
        );
    }

    /// Declares an output with a description.
    pub fn output_described(
        &mut self,
        key: impl Into<String>,
        value: ValueRef,
        description: impl Into<String>,
    ) {
        self.outputs.insert(
            key.into(),
            StackOutput {
                value,
                description: Some(description.into()),
            },
        );
    }

    /// Returns the resource with the given logical id.
    #[must_use]
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Resources of one type, by a matching closure.
    pub fn resources_where<'a, F>(
        &'a self,
        predicate: F,
    ) -> impl Iterator<Item = (&'a str, &'a Resource)>
    where
        F: Fn(&Resource) -> bool + 'a,
    {
        self.resources
            .iter()
            .filter(move |(_, resource)| predicate(resource))
            .map(|(id, resource)| (id.as_str(), resource))
    }

    /// Environment variables the provisioning tool must receive for image builds.
    #[must_use]
    pub fn build_env(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        for resource in self.resources.values() {
            match resource {
                Resource::Function(function) => {
                    vars.extend(function.image.build_args_from_env.values().cloned());
                }
                Resource::TaskDefinition(task) => {
                    for container in &task.containers {
                        vars.extend(container.image.build_args_from_env.values().cloned());
                    }
                }
                _ => {}
            }
        }
        vars
    }

    /// Checks that every output references a declared resource.
    pub fn validate(&self) -> Result<()> {
        for (key, output) in &self.outputs {
            if let Some(resource) = output.value.resource() {
                if !self.resources.contains_key(resource) {
                    return Err(StackflowError::provision(
                        &self.stack_id,
                        format!("output '{key}' references unknown resource '{resource}'"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Serializes the manifest as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RemovalPolicy;
    use crate::stacks::resources::{DockerImage, FunctionSpec, LogGroupSpec};

    fn template() -> StackTemplate {
        let id = StackId::new(DeploymentEnvironment::new("develop"), StackKind::ProcessEvents);
        StackTemplate::new(&id, "123", "us-west-2")
    }

    #[test]
    fn test_new_template_identity() {
        let t = template();
        assert_eq!(t.stack_id, "develop-process-events-stack");
        assert_eq!(t.kind, StackKind::ProcessEvents);
        assert!(t.resources.is_empty());
    }

    #[test]
    fn test_validate_rejects_dangling_output() {
        let mut t = template();
        t.output("fn", ValueRef::attr("Missing", "arn"));
        assert!(t.validate().is_err());

        let mut t = template();
        let id = t.add(
            "Logs",
            Resource::LogGroup(LogGroupSpec {
                name: "/x".to_string(),
                retention_days: 1,
                removal_policy: RemovalPolicy::Destroy,
            }),
        );
        t.output("logs", ValueRef::attr(id, "arn"));
        t.output("literal", ValueRef::literal("v"));
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_build_env_names_variables_not_values() {
        let mut t = template();
        t.add(
            "Fn",
            Resource::Function(FunctionSpec {
                image: DockerImage {
                    directory: "./service_code".to_string(),
                    platform: "linux/amd64".to_string(),
                    build_args_from_env: [(
                        "LIBRARY_TOKEN_GITHUB".to_string(),
                        "GITHUB_LIBRARY_TOKEN".to_string(),
                    )]
                    .into_iter()
                    .collect(),
                },
                role: "Role".to_string(),
                log_group: "Logs".to_string(),
                memory_mb: 512,
                reserved_concurrency: 10,
                vpc: ValueRef::literal("vpc-1"),
                security_groups: vec![],
                environment: BTreeMap::new(),
            }),
        );

        let vars: Vec<String> = t.build_env().into_iter().collect();
        assert_eq!(vars, vec!["GITHUB_LIBRARY_TOKEN".to_string()]);
    }
}
