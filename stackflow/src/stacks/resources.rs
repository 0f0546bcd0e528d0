//! Declarative resource model used in stack manifests.
//!
//! Resources reference each other by logical id through [`ValueRef`]; values
//! read from upstream output records are carried as literals.

use crate::core::RemovalPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// MySQL listener port opened between security groups.
pub const MYSQL_PORT: u16 = 3306;

/// A value known at synthesis time or produced by a resource on deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueRef {
    /// A fixed string.
    Literal(String),
    /// An attribute of a resource in the same manifest.
    Attribute {
        /// Logical id of the resource.
        resource: String,
        /// Attribute name, e.g. `arn`.
        attribute: String,
    },
    /// A list attribute rendered as one string.
    Encoded {
        /// Logical id of the resource.
        resource: String,
        /// List attribute name.
        attribute: String,
        /// How the list is rendered.
        encoding: ListEncoding,
    },
}

impl ValueRef {
    /// A fixed string.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// An attribute of another resource.
    #[must_use]
    pub fn attr(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Attribute {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }

    /// A list attribute rendered with the given encoding.
    #[must_use]
    pub fn encoded(
        resource: impl Into<String>,
        attribute: impl Into<String>,
        encoding: ListEncoding,
    ) -> Self {
        Self::Encoded {
            resource: resource.into(),
            attribute: attribute.into(),
            encoding,
        }
    }

    /// Logical id of the referenced resource, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Attribute { resource, .. } | Self::Encoded { resource, .. } => Some(resource),
        }
    }
}

/// Rendering of a list-valued output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListEncoding {
    /// JSON array string.
    Json,
    /// Comma-joined.
    Comma,
}

/// Subnet placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubnetType {
    /// Routed to the internet gateway.
    Public,
    /// Outbound through the NAT gateway only.
    PrivateWithEgress,
}

/// A subnet group replicated in every availability zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetGroup {
    /// Group name.
    pub name: String,
    /// Placement.
    pub subnet_type: SubnetType,
    /// CIDR prefix length of each subnet.
    pub cidr_mask: u8,
}

/// Services reachable through gateway endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEndpoint {
    /// Object storage.
    S3,
    /// Key-value table service.
    DynamoDb,
}

/// A new virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcSpec {
    /// Availability zones to span.
    pub max_azs: u8,
    /// Subnet groups.
    pub subnets: Vec<SubnetGroup>,
    /// NAT gateway count.
    pub nat_gateways: u8,
    /// Elastic IP allocations for the NAT gateways.
    pub nat_eip_allocations: Vec<ValueRef>,
    /// Gateway endpoints.
    pub gateway_endpoints: Vec<GatewayEndpoint>,
}

/// Rule direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Inbound.
    Ingress,
    /// Outbound.
    Egress,
}

/// The other side of a security group rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Peer {
    /// An IPv4 CIDR.
    Cidr(String),
    /// Another security group.
    SecurityGroup(ValueRef),
}

/// One TCP rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Inbound or outbound.
    pub direction: Direction,
    /// Peer.
    pub peer: Peer,
    /// TCP port.
    pub port: u16,
    /// Human-readable description.
    pub description: String,
}

impl Rule {
    /// An inbound TCP rule.
    #[must_use]
    pub fn ingress(peer: Peer, port: u16, description: impl Into<String>) -> Self {
        Self {
            direction: Direction::Ingress,
            peer,
            port,
            description: description.into(),
        }
    }

    /// An outbound TCP rule.
    #[must_use]
    pub fn egress(peer: Peer, port: u16, description: impl Into<String>) -> Self {
        Self {
            direction: Direction::Egress,
            peer,
            port,
            description: description.into(),
        }
    }
}

/// A security group with inline rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    /// Network the group belongs to.
    pub vpc: ValueRef,
    /// Description.
    pub description: String,
    /// Whether all outbound traffic is allowed.
    pub allow_all_outbound: bool,
    /// Inline rules.
    pub rules: Vec<Rule>,
}

/// A rule attached to a group defined elsewhere, possibly in another stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRuleSpec {
    /// The group receiving the rule.
    pub group: ValueRef,
    /// The rule.
    #[serde(flatten)]
    pub rule: Rule,
}

/// Generated credentials for a database cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCredentials {
    /// Admin user name.
    pub username: String,
    /// Secret storing the generated credentials.
    pub secret_name: String,
}

/// A provisioned database instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// Instance identifier inside the cluster.
    pub id: String,
    /// Instance class, e.g. `t3.medium`.
    pub instance_class: String,
    /// Reachable from outside the network.
    pub publicly_accessible: bool,
    /// Minor engine upgrades applied automatically.
    pub auto_minor_version_upgrade: bool,
}

/// A managed MySQL-compatible cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseClusterSpec {
    /// Engine name.
    pub engine: String,
    /// Engine version.
    pub engine_version: String,
    /// Database created at launch.
    pub default_database: String,
    /// Credentials.
    pub credentials: GeneratedCredentials,
    /// Writer instance.
    pub writer: InstanceSpec,
    /// Network.
    pub vpc: ValueRef,
    /// Subnet placement.
    pub subnet_type: SubnetType,
    /// Security groups.
    pub security_groups: Vec<ValueRef>,
    /// Log retention in days.
    pub log_retention_days: u32,
    /// Teardown behaviour.
    pub removal_policy: RemovalPolicy,
}

/// Key attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// String.
    String,
    /// Number.
    Number,
}

/// A key attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttribute {
    /// Attribute name.
    pub name: String,
    /// Attribute type.
    pub attribute_type: AttributeType,
}

impl KeyAttribute {
    /// A string key.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::String,
        }
    }

    /// A number key.
    #[must_use]
    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::Number,
        }
    }
}

/// Attributes copied into an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Projection {
    /// Key attributes only.
    KeysOnly,
    /// Every attribute.
    All,
}

/// A global secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSecondaryIndex {
    /// Index name.
    pub name: String,
    /// Partition key.
    pub partition_key: KeyAttribute,
    /// Sort key.
    pub sort_key: KeyAttribute,
    /// Projected attributes.
    pub projection: Projection,
}

/// What a change stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamView {
    /// The item after the change.
    NewImage,
    /// Before and after images.
    NewAndOldImages,
}

/// Capacity billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    /// On-demand.
    PayPerRequest,
    /// Provisioned throughput.
    Provisioned,
}

/// A key-value table with a change stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Partition key.
    pub partition_key: KeyAttribute,
    /// Sort key.
    pub sort_key: KeyAttribute,
    /// Global secondary indexes.
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    /// Change stream view.
    pub stream: Option<StreamView>,
    /// Billing.
    pub billing_mode: BillingMode,
    /// Point-in-time recovery.
    pub point_in_time_recovery: bool,
    /// Teardown behaviour.
    pub removal_policy: RemovalPolicy,
}

/// An object storage bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    /// Globally unique bucket name.
    pub name: String,
    /// Anonymous read access.
    pub public_read_access: bool,
    /// Empty the bucket before deleting it.
    pub auto_delete_objects: bool,
    /// Teardown behaviour.
    pub removal_policy: RemovalPolicy,
}

/// A log group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogGroupSpec {
    /// Log group name.
    pub name: String,
    /// Retention in days.
    pub retention_days: u32,
    /// Teardown behaviour.
    pub removal_policy: RemovalPolicy,
}

/// Allow or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Allow.
    Allow,
    /// Deny.
    Deny,
}

/// One policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Allow or deny.
    pub effect: Effect,
    /// Actions.
    pub actions: Vec<String>,
    /// Resources.
    pub resources: Vec<String>,
}

impl PolicyStatement {
    /// Allows the actions on every resource.
    #[must_use]
    pub fn allow_all(actions: &[&str]) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.iter().map(|a| (*a).to_string()).collect(),
            resources: vec!["*".to_string()],
        }
    }

    /// Allows the actions on the given resources.
    ///
    /// Blank entries are dropped; with nothing left the statement covers
    /// every resource, so a missing upstream value never yields an empty
    /// resource list.
    #[must_use]
    pub fn allow_on<S: AsRef<str>>(actions: &[&str], resources: &[S]) -> Self {
        let resources: Vec<String> = resources
            .iter()
            .map(|r| r.as_ref().trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        if resources.is_empty() {
            return Self::allow_all(actions);
        }
        Self {
            effect: Effect::Allow,
            actions: actions.iter().map(|a| (*a).to_string()).collect(),
            resources,
        }
    }
}

/// An execution role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    /// Service principal allowed to assume the role.
    pub assumed_by: String,
    /// Named inline policies.
    pub inline_policies: BTreeMap<String, Vec<PolicyStatement>>,
}

impl RoleSpec {
    /// A role with no policies yet.
    #[must_use]
    pub fn new(assumed_by: impl Into<String>) -> Self {
        Self {
            assumed_by: assumed_by.into(),
            inline_policies: BTreeMap::new(),
        }
    }

    /// Adds a single-statement inline policy.
    #[must_use]
    pub fn with_policy(mut self, name: impl Into<String>, actions: &[&str]) -> Self {
        self.inline_policies
            .insert(name.into(), vec![PolicyStatement::allow_all(actions)]);
        self
    }

    /// Adds a single-statement inline policy limited to the given resources.
    #[must_use]
    pub fn with_scoped_policy<S: AsRef<str>>(
        mut self,
        name: impl Into<String>,
        actions: &[&str],
        resources: &[S],
    ) -> Self {
        self.inline_policies
            .insert(name.into(), vec![PolicyStatement::allow_on(actions, resources)]);
        self
    }

    /// Resources named by a policy's statements.
    #[must_use]
    pub fn policy_resources(&self, name: &str) -> Vec<&str> {
        self.inline_policies
            .get(name)
            .into_iter()
            .flatten()
            .flat_map(|statement| statement.resources.iter().map(String::as_str))
            .collect()
    }

    /// Every action granted by the role, in policy order.
    #[must_use]
    pub fn actions(&self) -> Vec<&str> {
        self.inline_policies
            .values()
            .flatten()
            .flat_map(|statement| statement.actions.iter().map(String::as_str))
            .collect()
    }
}

/// A container image built from a local directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerImage {
    /// Build context, relative to the workspace directory.
    pub directory: String,
    /// Target platform.
    pub platform: String,
    /// Build argument name to the environment variable supplying it.
    pub build_args_from_env: BTreeMap<String, String>,
}

/// Transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

/// A container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Port the container listens on.
    pub container_port: u16,
    /// Protocol.
    pub protocol: Protocol,
}

/// One container of a task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image.
    pub image: DockerImage,
    /// Environment variables.
    pub environment: BTreeMap<String, String>,
    /// Exposed ports.
    pub port_mappings: Vec<PortMapping>,
    /// Log group logical id.
    pub log_group: String,
    /// Log stream prefix.
    pub log_stream_prefix: String,
}

/// A serverless container task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinitionSpec {
    /// CPU units.
    pub cpu: u32,
    /// Memory in MiB.
    pub memory_mib: u32,
    /// Task role logical id.
    pub task_role: String,
    /// Containers.
    pub containers: Vec<ContainerSpec>,
}

/// A long-running service keeping tasks alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Cluster.
    pub cluster: ValueRef,
    /// Task definition.
    pub task_definition: ValueRef,
    /// Number of tasks to keep running.
    pub desired_count: u32,
    /// Subnet placement.
    pub subnet_type: SubnetType,
    /// Whether tasks get a public IP.
    pub assign_public_ip: bool,
    /// Security groups.
    pub security_groups: Vec<ValueRef>,
}

/// A container-image function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Image.
    pub image: DockerImage,
    /// Role logical id.
    pub role: String,
    /// Log group logical id.
    pub log_group: String,
    /// Memory in MB.
    pub memory_mb: u32,
    /// Reserved concurrent executions.
    pub reserved_concurrency: u32,
    /// Network.
    pub vpc: ValueRef,
    /// Security groups.
    pub security_groups: Vec<ValueRef>,
    /// Environment variables.
    pub environment: BTreeMap<String, String>,
}

/// Where a stream consumer starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StartingPosition {
    /// Oldest available record.
    TrimHorizon,
    /// Only new records.
    Latest,
}

/// Binds a function to a table change stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSourceMappingSpec {
    /// Consuming function.
    pub function: ValueRef,
    /// Table the stream belongs to.
    pub table_arn: ValueRef,
    /// Stream ARN.
    pub stream_arn: ValueRef,
    /// Starting position.
    pub starting_position: StartingPosition,
    /// Records per invocation.
    pub batch_size: u32,
    /// Retries of a failed batch.
    pub retry_attempts: u32,
}

/// Any resource a stack can declare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
    /// A static public address.
    ElasticIp,
    /// A new network.
    Vpc(VpcSpec),
    /// An existing network looked up by id.
    VpcLookup {
        /// Network id.
        vpc_id: ValueRef,
    },
    /// A security group.
    SecurityGroup(SecurityGroupSpec),
    /// A rule on a group declared elsewhere.
    SecurityGroupRule(SecurityGroupRuleSpec),
    /// A database cluster.
    DatabaseCluster(DatabaseClusterSpec),
    /// A key-value table.
    Table(TableSpec),
    /// An object bucket.
    Bucket(BucketSpec),
    /// A log group.
    LogGroup(LogGroupSpec),
    /// A role.
    Role(RoleSpec),
    /// A container cluster.
    ContainerCluster {
        /// Network.
        vpc: ValueRef,
    },
    /// A task definition.
    TaskDefinition(TaskDefinitionSpec),
    /// A service.
    Service(ServiceSpec),
    /// A function.
    Function(FunctionSpec),
    /// A stream-to-function binding.
    EventSourceMapping(EventSourceMappingSpec),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_serializes_with_type_tag() {
        let resource = Resource::Bucket(BucketSpec {
            name: "private-s3-bucket-develop".to_string(),
            public_read_access: false,
            auto_delete_objects: false,
            removal_policy: RemovalPolicy::Retain,
        });

        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["type"], "bucket");
        assert_eq!(json["removal_policy"], "Retain");
    }

    #[test]
    fn test_role_actions() {
        let role = RoleSpec::new("lambda.amazonaws.com")
            .with_policy("A", &["x:One"])
            .with_policy("B", &["y:Two", "y:Three"]);
        assert_eq!(role.actions(), vec!["x:One", "y:Two", "y:Three"]);
    }

    #[test]
    fn test_scoped_policy_falls_back_when_blank() {
        let role = RoleSpec::new("ecs-tasks.amazonaws.com")
            .with_scoped_policy("Scoped", &["rds:Connect"], &["arn:db", " "])
            .with_scoped_policy("Blank", &["dynamodb:PutItem"], &["", ""]);

        assert_eq!(role.policy_resources("Scoped"), vec!["arn:db"]);
        assert_eq!(role.policy_resources("Blank"), vec!["*"]);
        assert!(role.policy_resources("Absent").is_empty());
    }

    #[test]
    fn test_rule_flattens_into_group_rule() {
        let spec = SecurityGroupRuleSpec {
            group: ValueRef::literal("sg-1"),
            rule: Rule::ingress(Peer::Cidr("10.0.0.1/32".to_string()), MYSQL_PORT, "db"),
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["port"], 3306);
        assert_eq!(json["direction"], "ingress");
    }

    #[test]
    fn test_value_ref_resource() {
        assert_eq!(ValueRef::attr("Vpc", "vpcId").resource(), Some("Vpc"));
        assert_eq!(ValueRef::literal("x").resource(), None);
    }
}
