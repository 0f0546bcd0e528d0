//! Typed views of the upstream outputs each consuming stack relies on.

use super::lookup::ResolvedOutputs;
use crate::core::StackKind;

/// A typed, named subset of one upstream stack's outputs.
pub trait OutputContract: Sized {
    /// The upstream stack that produces these outputs.
    const SOURCE: StackKind;
    /// Every key the consumer expects, in diagnostic order.
    const KEYS: &'static [&'static str];

    /// Builds the typed view; missing keys are already blank.
    fn from_resolved(resolved: &ResolvedOutputs) -> Self;
}

/// Infrastructure outputs consumed by the event processor stack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventsInfrastructureOutputs {
    /// VPC to attach the function to.
    pub vpc_id: String,
    /// Event table ARN.
    pub event_log_table_arn: String,
    /// Database cluster ARN.
    pub rds_db_cluster_arn: String,
    /// Change stream ARN of the event table.
    pub event_log_table_stream_arn: String,
    /// Event table name.
    pub event_log_table_name: String,
    /// Database security group to open.
    pub aurora_security_group_id: String,
}

impl OutputContract for EventsInfrastructureOutputs {
    const SOURCE: StackKind = StackKind::Infrastructure;
    const KEYS: &'static [&'static str] = &[
        "vpcId",
        "eventLogArn",
        "rdsDbClusterArn",
        "eventLogTableStreamArn",
        "eventLogTableName",
        "auroraSecurityGroupId",
    ];

    fn from_resolved(resolved: &ResolvedOutputs) -> Self {
        Self {
            vpc_id: resolved.get("vpcId").to_string(),
            event_log_table_arn: resolved.get("eventLogArn").to_string(),
            rds_db_cluster_arn: resolved.get("rdsDbClusterArn").to_string(),
            event_log_table_stream_arn: resolved.get("eventLogTableStreamArn").to_string(),
            event_log_table_name: resolved.get("eventLogTableName").to_string(),
            aurora_security_group_id: resolved.get("auroraSecurityGroupId").to_string(),
        }
    }
}

/// Infrastructure outputs consumed by the task processor stack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TasksInfrastructureOutputs {
    /// Event table ARN.
    pub event_log_table_arn: String,
    /// VPC to run the container cluster in.
    pub vpc_id: String,
    /// Database security group to open.
    pub aurora_security_group_id: String,
    /// Database instance ARNs.
    pub rds_aurora_instance_arns: Vec<String>,
    /// Database cluster ARN.
    pub rds_db_cluster_arn: String,
    /// Event table name.
    pub event_log_table_name: String,
    /// Private bucket name.
    pub private_bucket_name: String,
}

impl OutputContract for TasksInfrastructureOutputs {
    const SOURCE: StackKind = StackKind::Infrastructure;
    const KEYS: &'static [&'static str] = &[
        "eventLogArn",
        "vpcId",
        "auroraSecurityGroupId",
        "rdsAuroraInstanceJoinedArns",
        "rdsDbClusterArn",
        "eventLogTableName",
        "privateBucketName",
    ];

    fn from_resolved(resolved: &ResolvedOutputs) -> Self {
        Self {
            event_log_table_arn: resolved.get("eventLogArn").to_string(),
            vpc_id: resolved.get("vpcId").to_string(),
            aurora_security_group_id: resolved.get("auroraSecurityGroupId").to_string(),
            rds_aurora_instance_arns: resolved
                .get("rdsAuroraInstanceJoinedArns")
                .split(',')
                .map(str::trim)
                .filter(|arn| !arn.is_empty())
                .map(String::from)
                .collect(),
            rds_db_cluster_arn: resolved.get("rdsDbClusterArn").to_string(),
            event_log_table_name: resolved.get("eventLogTableName").to_string(),
            private_bucket_name: resolved.get("privateBucketName").to_string(),
        }
    }
}

/// Task processor outputs consumed by the event processor stack.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskProcessorOutputs {
    /// JSON list of private subnet ids the tasks run in.
    pub vpc_subnets: String,
    /// Security group of the task service.
    pub vpc_security_group_id: String,
    /// Task definition ARN.
    pub task_definition_arn: String,
    /// Container cluster name.
    pub ecs_cluster_name: String,
    /// Container name inside the task definition.
    pub ecs_container_name: String,
    /// Container cluster ARN.
    pub ecs_cluster_arn: String,
    /// Security group of the task service.
    pub security_group_id: String,
    /// Service ARN.
    pub service_arn: String,
}

impl OutputContract for TaskProcessorOutputs {
    const SOURCE: StackKind = StackKind::ProcessTasks;
    const KEYS: &'static [&'static str] = &[
        "processTasksVpcSubnets",
        "processTasksVPCSecurityGroupId",
        "processTasksDefinitionArn",
        "processTasksEcsClusterName",
        "processTasksEcsContainerName",
        "processTaskEcsClusterArn",
        "processTasksSecurityGroupId",
        "processTaskServiceArn",
    ];

    fn from_resolved(resolved: &ResolvedOutputs) -> Self {
        Self {
            vpc_subnets: resolved.get("processTasksVpcSubnets").to_string(),
            vpc_security_group_id: resolved.get("processTasksVPCSecurityGroupId").to_string(),
            task_definition_arn: resolved.get("processTasksDefinitionArn").to_string(),
            ecs_cluster_name: resolved.get("processTasksEcsClusterName").to_string(),
            ecs_container_name: resolved.get("processTasksEcsContainerName").to_string(),
            ecs_cluster_arn: resolved.get("processTaskEcsClusterArn").to_string(),
            security_group_id: resolved.get("processTasksSecurityGroupId").to_string(),
            service_arn: resolved.get("processTaskServiceArn").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeploymentEnvironment, StackId};
    use crate::events::NoOpEventSink;
    use crate::outputs::{
        resolve_contract, MemoryOutputStore, MissingOutputPolicy, OutputRecord, OutputStore,
    };

    #[test]
    fn test_contract_key_counts() {
        assert_eq!(EventsInfrastructureOutputs::KEYS.len(), 6);
        assert_eq!(TasksInfrastructureOutputs::KEYS.len(), 7);
        assert_eq!(TaskProcessorOutputs::KEYS.len(), 8);
    }

    #[test]
    fn test_tasks_contract_splits_instance_arns() {
        let store = MemoryOutputStore::new();
        let id = StackId::new(DeploymentEnvironment::new("develop"), StackKind::Infrastructure);
        store
            .write(
                &id,
                &OutputRecord::new()
                    .with("rdsAuroraInstanceJoinedArns", "arn:a, arn:b,")
                    .with("vpcId", "vpc-1"),
            )
            .unwrap();

        let outputs: TasksInfrastructureOutputs = resolve_contract(
            &store,
            &id.environment,
            MissingOutputPolicy::Warn,
            &NoOpEventSink,
        )
        .unwrap();

        assert_eq!(outputs.rds_aurora_instance_arns, vec!["arn:a", "arn:b"]);
        assert_eq!(outputs.vpc_id, "vpc-1");
        assert_eq!(outputs.private_bucket_name, "");
    }
}
