//! Change-stream driven event processor function.

use super::resources::{
    EventSourceMappingSpec, FunctionSpec, LogGroupSpec, Peer, Resource, RoleSpec, Rule,
    SecurityGroupRuleSpec, SecurityGroupSpec, StartingPosition, ValueRef, MYSQL_PORT,
};
use super::process_tasks::table_and_indexes;
use super::{StackContext, StackDefinition, StackTemplate};
use crate::core::{RemovalPolicy, StackKind};
use crate::errors::Result;
use crate::events::EventSink;
use crate::outputs::{
    resolve_contract, EventsInfrastructureOutputs, OutputStore, TaskProcessorOutputs,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Records handed to one function invocation.
pub const STREAM_BATCH_SIZE: u32 = 5;
/// Retries of a failed batch.
pub const STREAM_RETRY_ATTEMPTS: u32 = 1;

/// Container-image function consuming the event table's change stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEventsStack;

impl StackDefinition for ProcessEventsStack {
    fn kind(&self) -> StackKind {
        StackKind::ProcessEvents
    }

    fn synthesize(
        &self,
        ctx: &StackContext,
        store: &dyn OutputStore,
        sink: &dyn EventSink,
    ) -> Result<StackTemplate> {
        let env = ctx.environment();
        let infra: EventsInfrastructureOutputs =
            resolve_contract(store, env, ctx.missing_outputs(), sink)?;
        let tasks: TaskProcessorOutputs =
            resolve_contract(store, env, ctx.missing_outputs(), sink)?;

        let mut template = ctx.template(self.kind());

        let vpc = template.add(
            "VPC",
            Resource::VpcLookup {
                vpc_id: ValueRef::literal(&infra.vpc_id),
            },
        );

        let role = template.add(
            format!("{env}-process-events-role"),
            Resource::Role(
                RoleSpec::new("lambda.amazonaws.com")
                    .with_policy("SecretManagerPolicy", &["secretsmanager:GetSecretValue"])
                    .with_policy(
                        "CloudWatchPolicy",
                        &[
                            "logs:CreateLogGroup",
                            "logs:CreateLogStream",
                            "logs:PutLogEvents",
                        ],
                    )
                    .with_scoped_policy(
                        "DynamoPolicy",
                        &[
                            "dynamodb:BatchWriteItem",
                            "dynamodb:PutItem",
                            "dynamodb:TransactWriteItems",
                        ],
                        &table_and_indexes(&infra.event_log_table_arn),
                    )
                    .with_scoped_policy(
                        "AuroraPolicy",
                        &[
                            "rds:Connect",
                            "rds:DescribeDBInstances",
                            "rds:DescribeDBClusters",
                        ],
                        &[infra.rds_db_cluster_arn.as_str()],
                    )
                    .with_policy(
                        "EcsPolicy",
                        &[
                            "ecs:StartTask",
                            "ecs:StopTask",
                            "ecs:RunTask",
                            "ecs:UpdateService",
                            "ecs:DescribeServices",
                        ],
                    )
                    .with_policy(
                        "Ec2NetworkPolicy",
                        &[
                            "ec2:DescribeNetworkInterfaces",
                            "ec2:CreateNetworkInterface",
                            "ec2:DeleteNetworkInterface",
                            "ec2:DescribeSecurityGroups",
                        ],
                    )
                    .with_policy("PassRolePolicy", &["iam:PassRole"]),
            ),
        );

        let log_group = template.add(
            format!("{env}-process-events-log-group"),
            Resource::LogGroup(LogGroupSpec {
                name: format!("/lambda/{env}/process-events"),
                retention_days: 1,
                removal_policy: RemovalPolicy::Destroy,
            }),
        );

        let security_group = template.add(
            format!("{env}-process-events-security-group"),
            Resource::SecurityGroup(SecurityGroupSpec {
                vpc: ValueRef::attr(&vpc, "vpcId"),
                description: "Security group assigned to the process-events function".to_string(),
                allow_all_outbound: true,
                rules: Vec::new(),
            }),
        );
        let security_group_id = ValueRef::attr(&security_group, "securityGroupId");

        let environment: BTreeMap<String, String> = [
            ("PROCESS_TASKS_VPC_SUBNETS", tasks.vpc_subnets),
            ("PROCESS_TASKS_SECURITY_GROUP_ID", tasks.security_group_id),
            (
                "PROCESS_TASKS_VPC_SECURITY_GROUP_ID",
                tasks.vpc_security_group_id,
            ),
            ("PROCESS_TASKS_TASK_DEFINITION_ARN", tasks.task_definition_arn),
            ("PROCESS_TASKS_CLUSTER_NAME", tasks.ecs_cluster_name),
            ("PROCESS_TASKS_CONTAINER_NAME", tasks.ecs_container_name),
            (
                "EVENT_LOG_TABLE_STREAM_ARN",
                infra.event_log_table_stream_arn.clone(),
            ),
            ("EVENT_SOURCE_TABLE_NAME", infra.event_log_table_name.clone()),
            ("DEPLOYMENT_ENVIRONMENT", env.to_string()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        let function = template.add(
            format!("{env}-process-events"),
            Resource::Function(FunctionSpec {
                image: ctx.service_image(),
                role,
                log_group,
                memory_mb: 512,
                reserved_concurrency: 10,
                vpc: ValueRef::attr(&vpc, "vpcId"),
                security_groups: vec![security_group_id.clone()],
                environment,
            }),
        );

        template.add(
            "EventLogStreamSource",
            Resource::EventSourceMapping(EventSourceMappingSpec {
                function: ValueRef::attr(&function, "functionArn"),
                table_arn: ValueRef::literal(&infra.event_log_table_arn),
                stream_arn: ValueRef::literal(&infra.event_log_table_stream_arn),
                starting_position: StartingPosition::TrimHorizon,
                batch_size: STREAM_BATCH_SIZE,
                retry_attempts: STREAM_RETRY_ATTEMPTS,
            }),
        );

        template.add(
            "AuroraSecurityGroupIngressFromEvents",
            Resource::SecurityGroupRule(SecurityGroupRuleSpec {
                group: ValueRef::literal(&infra.aurora_security_group_id),
                rule: Rule::ingress(
                    Peer::SecurityGroup(security_group_id),
                    MYSQL_PORT,
                    "Allow (AM-SG) access from process-events lambda",
                ),
            }),
        );

        template.output("processEventsFunctionName", ValueRef::attr(&function, "functionName"));
        template.output("processEventsFunctionArn", ValueRef::attr(&function, "functionArn"));

        template.validate()?;
        debug!(
            stack_id = %template.stack_id,
            resources = template.resources.len(),
            "Synthesized process events stack"
        );
        Ok(template)
    }
}
