//! Long-running container task processor.

use super::resources::{
    ContainerSpec, ListEncoding, LogGroupSpec, Peer, PortMapping, Protocol, Resource, RoleSpec,
    Rule, SecurityGroupRuleSpec, SecurityGroupSpec, ServiceSpec, SubnetType, TaskDefinitionSpec,
    ValueRef, MYSQL_PORT,
};
use super::{StackContext, StackDefinition, StackTemplate};
use crate::core::{RemovalPolicy, StackKind};
use crate::errors::Result;
use crate::events::EventSink;
use crate::outputs::{resolve_contract, OutputStore, TasksInfrastructureOutputs};
use std::collections::BTreeMap;
use tracing::debug;

/// Port the task container listens on.
pub const CONTAINER_PORT: u16 = 8080;

/// The table ARN and its index wildcard, or nothing when the ARN is unknown.
pub(crate) fn table_and_indexes(table_arn: &str) -> Vec<String> {
    if table_arn.trim().is_empty() {
        return Vec::new();
    }
    vec![table_arn.to_string(), format!("{table_arn}/index/*")]
}

/// Container cluster, task definition and service for the task processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTasksStack;

impl StackDefinition for ProcessTasksStack {
    fn kind(&self) -> StackKind {
        StackKind::ProcessTasks
    }

    fn synthesize(
        &self,
        ctx: &StackContext,
        store: &dyn OutputStore,
        sink: &dyn EventSink,
    ) -> Result<StackTemplate> {
        let upstream: TasksInfrastructureOutputs =
            resolve_contract(store, ctx.environment(), ctx.missing_outputs(), sink)?;

        let env = ctx.environment();
        let mut template = ctx.template(self.kind());

        let vpc = template.add(
            format!("vpc-lookup-for-ecs-{env}"),
            Resource::VpcLookup {
                vpc_id: ValueRef::literal(&upstream.vpc_id),
            },
        );

        let cluster = template.add(
            format!("cluster-{env}"),
            Resource::ContainerCluster {
                vpc: ValueRef::attr(&vpc, "vpcId"),
            },
        );

        let table_resources = table_and_indexes(&upstream.event_log_table_arn);
        let aurora_resources: Vec<&str> = upstream
            .rds_aurora_instance_arns
            .iter()
            .map(String::as_str)
            .chain([upstream.rds_db_cluster_arn.as_str()])
            .collect();

        let role = template.add(
            format!("EcsTaskRole-{env}"),
            Resource::Role(
                RoleSpec::new("ecs-tasks.amazonaws.com")
                    .with_policy("SecretManagerPolicy", &["secretsmanager:GetSecretValue"])
                    .with_policy(
                        "Ec2NetworkPolicy",
                        &[
                            "ec2:DescribeNetworkInterfaces",
                            "ec2:CreateNetworkInterface",
                            "ec2:DeleteNetworkInterface",
                            "ec2:DescribeSecurityGroups",
                        ],
                    )
                    .with_policy("s3Policy", &["s3:GetObject", "s3:PutObject"])
                    .with_scoped_policy(
                        "DynamoPolicy",
                        &[
                            "dynamodb:BatchWriteItem",
                            "dynamodb:PutItem",
                            "dynamodb:TransactWriteItems",
                        ],
                        &table_resources,
                    )
                    .with_scoped_policy(
                        "AuroraPolicy",
                        &[
                            "rds:Connect",
                            "rds:DescribeDBInstances",
                            "rds:DescribeDBClusters",
                        ],
                        &aurora_resources,
                    ),
            ),
        );

        let log_group = template.add(
            format!("LogGroup-{env}"),
            Resource::LogGroup(LogGroupSpec {
                name: format!("/ecs/{env}/process-task"),
                retention_days: 1,
                removal_policy: RemovalPolicy::Destroy,
            }),
        );

        let container_name = format!("Container-{env}");
        let mut environment = BTreeMap::new();
        environment.insert("AWS_REGION".to_string(), ctx.settings().region.clone());
        environment.insert(
            "EVENT_SOURCE_TABLE_NAME".to_string(),
            upstream.event_log_table_name.clone(),
        );
        environment.insert("DEPLOYMENT_ENVIRONMENT".to_string(), env.to_string());
        environment.insert(
            "BUCKET_NAME".to_string(),
            upstream.private_bucket_name.clone(),
        );

        let task_definition = template.add(
            format!("TaskDefinition-{env}"),
            Resource::TaskDefinition(TaskDefinitionSpec {
                cpu: 256,
                memory_mib: 512,
                task_role: role,
                containers: vec![ContainerSpec {
                    name: container_name.clone(),
                    image: ctx.service_image(),
                    environment,
                    port_mappings: vec![PortMapping {
                        container_port: CONTAINER_PORT,
                        protocol: Protocol::Tcp,
                    }],
                    log_group,
                    log_stream_prefix: format!("process-task-{env}"),
                }],
            }),
        );

        let security_group = template.add(
            format!("SecurityGroup-{env}"),
            Resource::SecurityGroup(SecurityGroupSpec {
                vpc: ValueRef::attr(&vpc, "vpcId"),
                description: "FTS-SG: Security Group assigned to Fargate Task Service"
                    .to_string(),
                allow_all_outbound: true,
                rules: vec![Rule::ingress(
                    Peer::SecurityGroup(ValueRef::literal(&upstream.aurora_security_group_id)),
                    MYSQL_PORT,
                    "Allow (AM-SG) ingress to (FTS-SG) on port 3306",
                )],
            }),
        );
        let security_group_id = ValueRef::attr(&security_group, "securityGroupId");

        template.add(
            "AuroraSecurityGroupIngressFromTasks",
            Resource::SecurityGroupRule(SecurityGroupRuleSpec {
                group: ValueRef::literal(&upstream.aurora_security_group_id),
                rule: Rule::ingress(
                    Peer::SecurityGroup(security_group_id.clone()),
                    MYSQL_PORT,
                    "Allow (FTS-SG) ingress to (AM-SG) on port 3306",
                ),
            }),
        );

        let service = template.add(
            format!("FargateService-{env}"),
            Resource::Service(ServiceSpec {
                cluster: ValueRef::attr(&cluster, "clusterName"),
                task_definition: ValueRef::attr(&task_definition, "taskDefinitionArn"),
                desired_count: 1,
                subnet_type: SubnetType::PrivateWithEgress,
                assign_public_ip: false,
                security_groups: vec![security_group_id.clone()],
            }),
        );

        template.output("processTaskServiceArn", ValueRef::attr(&service, "serviceArn"));
        template.output("processTasksSecurityGroupId", security_group_id.clone());
        template.output_described(
            "processTasksVpcSubnets",
            ValueRef::encoded(&vpc, "privateSubnetIds", ListEncoding::Json),
            "Subnets used by the Fargate service",
        );
        template.output_described(
            "processTasksVPCSecurityGroupId",
            security_group_id,
            "Security Group ID for the Fargate service",
        );
        template.output_described(
            "processTasksDefinitionArn",
            ValueRef::attr(&task_definition, "taskDefinitionArn"),
            "Fargate Task Definition ARN",
        );
        template.output_described(
            "processTasksEcsClusterName",
            ValueRef::attr(&cluster, "clusterName"),
            "Name of the ECS cluster",
        );
        template.output_described(
            "processTasksEcsContainerName",
            ValueRef::literal(container_name),
            "Name of the ECS container",
        );
        template.output_described(
            "processTaskEcsClusterArn",
            ValueRef::attr(&cluster, "clusterArn"),
            "ECS cluster ARN",
        );

        template.validate()?;
        debug!(
            stack_id = %template.stack_id,
            resources = template.resources.len(),
            "Synthesized process tasks stack"
        );
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StackId;
    use crate::errors::StackflowError;
    use crate::events::{CollectingEventSink, OUTPUTS_MISSING};
    use crate::outputs::{
        MemoryOutputStore, MissingOutputPolicy, OutputContract, OutputRecord,
        TaskProcessorOutputs,
    };
    use crate::stacks::resources::Direction;
    use crate::stacks::test_support::{context, context_with_policy};
    use pretty_assertions::assert_eq;

    fn seeded_store(env: &str) -> MemoryOutputStore {
        let store = MemoryOutputStore::new();
        store
            .write(
                &StackId::new(env.into(), StackKind::Infrastructure),
                &OutputRecord::new()
                    .with("eventLogArn", "arn:table")
                    .with("vpcId", "vpc-123")
                    .with("auroraSecurityGroupId", "sg-aurora")
                    .with("rdsAuroraInstanceJoinedArns", "arn:db:1")
                    .with("rdsDbClusterArn", "arn:cluster")
                    .with("eventLogTableName", "develop-event-log")
                    .with("privateBucketName", "private-s3-bucket-develop"),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_task_definition_shape() {
        let sink = CollectingEventSink::new();
        let template = ProcessTasksStack
            .synthesize(&context("develop"), &seeded_store("develop"), &sink)
            .unwrap();
        assert!(sink.is_empty());

        let Some(Resource::TaskDefinition(task)) = template.resource("TaskDefinition-develop")
        else {
            panic!("task definition missing");
        };
        assert_eq!(task.cpu, 256);
        assert_eq!(task.memory_mib, 512);

        let container = &task.containers[0];
        assert_eq!(container.port_mappings[0].container_port, 8080);
        assert_eq!(container.environment["EVENT_SOURCE_TABLE_NAME"], "develop-event-log");
        assert_eq!(container.environment["BUCKET_NAME"], "private-s3-bucket-develop");
        assert_eq!(container.environment["DEPLOYMENT_ENVIRONMENT"], "develop");
        assert_eq!(container.environment["AWS_REGION"], "us-west-2");

        let Some(Resource::LogGroup(logs)) = template.resource("LogGroup-develop") else {
            panic!("log group missing");
        };
        assert_eq!(logs.name, "/ecs/develop/process-task");
        assert_eq!(logs.retention_days, 1);
    }

    #[test]
    fn test_bidirectional_mysql_rule_pair() {
        let template = ProcessTasksStack
            .synthesize(&context("develop"), &seeded_store("develop"), &CollectingEventSink::new())
            .unwrap();

        let Some(Resource::SecurityGroup(tasks_group)) = template.resource("SecurityGroup-develop")
        else {
            panic!("task security group missing");
        };
        assert_eq!(tasks_group.rules.len(), 1);
        assert_eq!(tasks_group.rules[0].port, 3306);
        assert_eq!(
            tasks_group.rules[0].peer,
            Peer::SecurityGroup(ValueRef::literal("sg-aurora"))
        );

        let Some(Resource::SecurityGroupRule(aurora_rule)) =
            template.resource("AuroraSecurityGroupIngressFromTasks")
        else {
            panic!("aurora rule missing");
        };
        assert_eq!(aurora_rule.group, ValueRef::literal("sg-aurora"));
        assert_eq!(aurora_rule.rule.direction, Direction::Ingress);
        assert_eq!(aurora_rule.rule.port, 3306);
    }

    #[test]
    fn test_service_is_private() {
        let template = ProcessTasksStack
            .synthesize(&context("develop"), &seeded_store("develop"), &CollectingEventSink::new())
            .unwrap();
        let Some(Resource::Service(service)) = template.resource("FargateService-develop") else {
            panic!("service missing");
        };
        assert_eq!(service.desired_count, 1);
        assert!(!service.assign_public_ip);
        assert_eq!(service.subnet_type, SubnetType::PrivateWithEgress);
    }

    #[test]
    fn test_task_role_permissions_are_exact() {
        let template = ProcessTasksStack
            .synthesize(&context("develop"), &seeded_store("develop"), &CollectingEventSink::new())
            .unwrap();
        let Some(Resource::Role(role)) = template.resource("EcsTaskRole-develop") else {
            panic!("role missing");
        };
        let mut actions = role.actions();
        actions.sort_unstable();
        assert_eq!(
            actions,
            vec![
                "dynamodb:BatchWriteItem",
                "dynamodb:PutItem",
                "dynamodb:TransactWriteItems",
                "ec2:CreateNetworkInterface",
                "ec2:DeleteNetworkInterface",
                "ec2:DescribeNetworkInterfaces",
                "ec2:DescribeSecurityGroups",
                "rds:Connect",
                "rds:DescribeDBClusters",
                "rds:DescribeDBInstances",
                "s3:GetObject",
                "s3:PutObject",
                "secretsmanager:GetSecretValue",
            ]
        );
    }

    #[test]
    fn test_data_policies_are_scoped_to_upstream_arns() {
        let template = ProcessTasksStack
            .synthesize(&context("develop"), &seeded_store("develop"), &CollectingEventSink::new())
            .unwrap();
        let Some(Resource::Role(role)) = template.resource("EcsTaskRole-develop") else {
            panic!("role missing");
        };
        assert_eq!(
            role.policy_resources("DynamoPolicy"),
            vec!["arn:table", "arn:table/index/*"]
        );
        assert_eq!(
            role.policy_resources("AuroraPolicy"),
            vec!["arn:db:1", "arn:cluster"]
        );
        assert_eq!(role.policy_resources("s3Policy"), vec!["*"]);
    }

    #[test]
    fn test_data_policies_widen_when_arns_unknown() {
        let template = ProcessTasksStack
            .synthesize(&context("develop"), &MemoryOutputStore::new(), &CollectingEventSink::new())
            .unwrap();
        let Some(Resource::Role(role)) = template.resource("EcsTaskRole-develop") else {
            panic!("role missing");
        };
        assert_eq!(role.policy_resources("DynamoPolicy"), vec!["*"]);
        assert_eq!(role.policy_resources("AuroraPolicy"), vec!["*"]);
    }

    #[test]
    fn test_table_and_indexes() {
        assert_eq!(table_and_indexes("arn:t"), vec!["arn:t", "arn:t/index/*"]);
        assert!(table_and_indexes("  ").is_empty());
    }

    #[test]
    fn test_declares_task_processor_contract() {
        let template = ProcessTasksStack
            .synthesize(&context("develop"), &seeded_store("develop"), &CollectingEventSink::new())
            .unwrap();
        for key in TaskProcessorOutputs::KEYS {
            assert!(template.outputs.contains_key(*key), "missing output {key}");
        }
        assert_eq!(template.outputs.len(), TaskProcessorOutputs::KEYS.len());
    }

    #[test]
    fn test_missing_upstream_warns_and_continues() {
        let sink = CollectingEventSink::new();
        let template = ProcessTasksStack
            .synthesize(&context("develop"), &MemoryOutputStore::new(), &sink)
            .unwrap();

        let events = sink.events_of_type(OUTPUTS_MISSING);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1.as_ref().unwrap()["missing"].as_array().unwrap().len(), 7);

        let Some(Resource::VpcLookup { vpc_id }) = template.resource("vpc-lookup-for-ecs-develop")
        else {
            panic!("vpc lookup missing");
        };
        assert_eq!(*vpc_id, ValueRef::literal(""));
    }

    #[test]
    fn test_missing_upstream_fails_under_strict_policy() {
        let err = ProcessTasksStack
            .synthesize(
                &context_with_policy("develop", MissingOutputPolicy::Fail),
                &MemoryOutputStore::new(),
                &CollectingEventSink::new(),
            )
            .unwrap_err();
        assert!(matches!(err, StackflowError::MissingOutputs(_)));
    }
}
