//! Network, database cluster, event table and private bucket.

use super::resources::{
    BillingMode, BucketSpec, DatabaseClusterSpec, GatewayEndpoint, GeneratedCredentials,
    GlobalSecondaryIndex, InstanceSpec, KeyAttribute, ListEncoding, Peer, Projection, Resource,
    Rule, SecurityGroupSpec, StreamView, SubnetGroup, SubnetType, TableSpec, ValueRef, VpcSpec,
    MYSQL_PORT,
};
use super::{StackContext, StackDefinition, StackTemplate};
use crate::core::StackKind;
use crate::errors::Result;
use crate::events::EventSink;
use crate::outputs::OutputStore;
use tracing::debug;

const NAT_EIP: &str = "NatGatewayEIP";
const AURORA_SECURITY_GROUP: &str = "AuroraSecurityGroup";

/// The shared infrastructure every service stack builds on.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfrastructureStack;

impl StackDefinition for InfrastructureStack {
    fn kind(&self) -> StackKind {
        StackKind::Infrastructure
    }

    fn synthesize(
        &self,
        ctx: &StackContext,
        _store: &dyn OutputStore,
        _sink: &dyn EventSink,
    ) -> Result<StackTemplate> {
        let mut template = ctx.template(self.kind());

        let vpc = private_vpc(ctx, &mut template);
        database_cluster(ctx, &mut template, &vpc);
        event_log_table(ctx, &mut template);
        private_bucket(ctx, &mut template);

        template.validate()?;
        debug!(
            stack_id = %template.stack_id,
            resources = template.resources.len(),
            "Synthesized infrastructure stack"
        );
        Ok(template)
    }
}

fn private_vpc(ctx: &StackContext, template: &mut StackTemplate) -> String {
    let env = ctx.environment();
    let eip = template.add(NAT_EIP, Resource::ElasticIp);

    let subnet = |name: &str, subnet_type| SubnetGroup {
        name: name.to_string(),
        subnet_type,
        cidr_mask: 24,
    };

    let vpc = template.add(
        format!("vpc-{env}"),
        Resource::Vpc(VpcSpec {
            max_azs: 2,
            subnets: vec![
                subnet("public-subnet-0", SubnetType::Public),
                subnet("public-subnet-1", SubnetType::Public),
                subnet("private-subnet", SubnetType::PrivateWithEgress),
            ],
            nat_gateways: 1,
            nat_eip_allocations: vec![ValueRef::attr(eip, "allocationId")],
            gateway_endpoints: vec![GatewayEndpoint::S3, GatewayEndpoint::DynamoDb],
        }),
    );

    template.output("vpcArn", ValueRef::attr(&vpc, "vpcArn"));
    template.output("vpcId", ValueRef::attr(&vpc, "vpcId"));
    template.output(
        "PublicSubnetsIdList",
        ValueRef::encoded(&vpc, "publicSubnetIds", ListEncoding::Json),
    );
    template.output(
        "PrivateSubnetIdList",
        ValueRef::encoded(&vpc, "privateSubnetIds", ListEncoding::Json),
    );
    vpc
}

fn database_cluster(ctx: &StackContext, template: &mut StackTemplate, vpc: &str) {
    let env = ctx.environment();

    let mut rules = Vec::new();
    for ip in &ctx.settings().allow_list_ips {
        rules.push(Rule::ingress(
            Peer::Cidr(ip.clone()),
            MYSQL_PORT,
            format!("Allow (AM-SG) access from {ip}"),
        ));
    }
    for ip in &ctx.settings().allow_list_ips {
        rules.push(Rule::egress(
            Peer::Cidr(ip.clone()),
            MYSQL_PORT,
            format!("Provide (AM-SG) data to {ip}"),
        ));
    }

    let security_group = template.add(
        AURORA_SECURITY_GROUP,
        Resource::SecurityGroup(SecurityGroupSpec {
            vpc: ValueRef::attr(vpc, "vpcId"),
            description: "AM-SG: Security group assigned to Aurora Mysql Cluster.".to_string(),
            allow_all_outbound: true,
            rules,
        }),
    );

    let secret_name = env.database_secret_name();
    let cluster = template.add(
        format!("mysql-provisioned-cluster-{env}"),
        Resource::DatabaseCluster(DatabaseClusterSpec {
            engine: "aurora-mysql".to_string(),
            engine_version: "3.07.1".to_string(),
            default_database: env.database_name(),
            credentials: GeneratedCredentials {
                username: env.database_user_name(),
                secret_name: secret_name.clone(),
            },
            writer: InstanceSpec {
                id: "mysql-writer-instance".to_string(),
                instance_class: "t3.medium".to_string(),
                publicly_accessible: true,
                auto_minor_version_upgrade: true,
            },
            vpc: ValueRef::attr(vpc, "vpcId"),
            subnet_type: SubnetType::Public,
            security_groups: vec![ValueRef::attr(&security_group, "securityGroupId")],
            log_retention_days: 7,
            removal_policy: env.removal_policy(),
        }),
    );

    template.output(
        "auroraSecurityGroupId",
        ValueRef::attr(&security_group, "securityGroupId"),
    );
    template.output("rdsDbClusterArn", ValueRef::attr(&cluster, "clusterArn"));
    template.output(
        "rdsDbClusterHostName",
        ValueRef::attr(&cluster, "endpointHostname"),
    );
    template.output(
        "rdsAuroraInstanceJoinedArns",
        ValueRef::encoded(&cluster, "instanceArns", ListEncoding::Comma),
    );
    template.output("secretName", ValueRef::literal(secret_name));
}

fn event_log_table(ctx: &StackContext, template: &mut StackTemplate) {
    let env = ctx.environment();
    let table_name = format!("{env}-event-log");

    let table = template.add(
        format!("event-log-{env}"),
        Resource::Table(TableSpec {
            name: table_name,
            partition_key: KeyAttribute::string("partition"),
            sort_key: KeyAttribute::string("sort"),
            global_secondary_indexes: vec![
                GlobalSecondaryIndex {
                    name: "index-gsi1".to_string(),
                    partition_key: KeyAttribute::string("gsi1-p"),
                    sort_key: KeyAttribute::number("gsi1-s"),
                    projection: Projection::KeysOnly,
                },
                GlobalSecondaryIndex {
                    name: "index-gsi2".to_string(),
                    partition_key: KeyAttribute::string("gsi2-p"),
                    sort_key: KeyAttribute::string("gsi2-s"),
                    projection: Projection::KeysOnly,
                },
            ],
            stream: Some(StreamView::NewImage),
            billing_mode: BillingMode::PayPerRequest,
            point_in_time_recovery: false,
            removal_policy: env.removal_policy(),
        }),
    );

    template.output("eventLogTableName", ValueRef::attr(&table, "tableName"));
    template.output("eventLogArn", ValueRef::attr(&table, "tableArn"));
    template.output(
        "eventLogTableStreamArn",
        ValueRef::attr(&table, "tableStreamArn"),
    );
}

fn private_bucket(ctx: &StackContext, template: &mut StackTemplate) {
    let env = ctx.environment();

    let bucket = template.add(
        format!("affordable-storage-{env}"),
        Resource::Bucket(BucketSpec {
            name: format!("private-s3-bucket-{env}"),
            public_read_access: false,
            auto_delete_objects: !env.is_persistent(),
            removal_policy: env.removal_policy(),
        }),
    );

    template.output("privateBucketName", ValueRef::attr(&bucket, "bucketName"));
    template.output("privateBucketArn", ValueRef::attr(&bucket, "bucketArn"));
}
