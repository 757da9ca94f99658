//! Data models for the Scaleway API
//!
//! Based on the Scaleway REST API structure: VPC v2 (regional), Public
//! Gateway v1 (zoned), Load Balancer v1 (zoned), Instance v1 (zoned),
//! Marketplace v2 and IPAM v1 (regional).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// VPC

/// A private network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateNetwork {
    /// Unique identifier.
    pub id: String,
    /// Name of the private network.
    pub name: String,
    /// Whether managed DHCP is enabled on this network.
    #[serde(default)]
    pub dhcp_enabled: bool,
    /// Subnets of the network, in CIDR notation.
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    /// Tags of the network.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A subnet of a private network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    /// Unique identifier.
    pub id: String,
    /// CIDR of the subnet.
    pub subnet: String,
}

// ---------------------------------------------------------------------------
// Public gateway

/// A flexible IP usable by a public gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayIp {
    /// Unique identifier.
    pub id: String,
    /// IPv4 address.
    pub address: String,
    /// Tags of the IP.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A public (NAT) gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gateway {
    /// Unique identifier.
    pub id: String,
    /// Name of the gateway.
    pub name: String,
    /// Commercial offer type.
    #[serde(default, rename = "type")]
    pub gateway_type: Option<String>,
    /// Flexible IP attached to the gateway.
    #[serde(default)]
    pub ip: Option<GatewayIp>,
}

/// Attachment of a gateway to a private network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayNetwork {
    /// Unique identifier.
    pub id: String,
    /// Gateway side of the attachment.
    pub gateway_id: String,
    /// Private network side of the attachment.
    pub private_network_id: String,
}

// ---------------------------------------------------------------------------
// Load balancer

/// Status of a load balancer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LbStatus {
    /// Ready to serve traffic.
    Ready,
    /// Being provisioned.
    Pending,
    /// Being migrated.
    Migrating,
    /// In error.
    Error,
    /// Anything the client does not know about.
    #[serde(other)]
    Unknown,
}

/// A flexible IP owned by a load balancer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LbIp {
    /// Unique identifier.
    pub id: String,
    /// Address, IPv4 or IPv6.
    pub ip_address: String,
}

/// A load balancer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lb {
    /// Unique identifier.
    pub id: String,
    /// Name of the load balancer.
    pub name: String,
    /// Provisioning status.
    pub status: LbStatus,
    /// Commercial offer type.
    #[serde(default, rename = "type")]
    pub lb_type: Option<String>,
    /// IPs owned by the load balancer.
    #[serde(default)]
    pub ip: Vec<LbIp>,
    /// Tags of the load balancer.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// TCP health check configuration of a backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthCheck {
    /// Port probed by the health check.
    pub port: u32,
    /// Number of consecutive failures before a server is marked down.
    pub check_max_retries: u32,
}

/// A load balancer backend: pool of target servers plus health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backend {
    /// Unique identifier.
    pub id: String,
    /// Name of the backend.
    pub name: String,
    /// Port traffic is forwarded to.
    pub forward_port: u32,
    /// IPs of the servers in the pool.
    #[serde(default)]
    pub pool: Vec<String>,
    /// Health check configuration.
    #[serde(default)]
    pub health_check: Option<HealthCheck>,
}

/// A load balancer frontend: listening port bound to one backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frontend {
    /// Unique identifier.
    pub id: String,
    /// Name of the frontend.
    pub name: String,
    /// Listening port.
    pub inbound_port: u32,
    /// Backend this frontend is bound to.
    #[serde(default)]
    pub backend_id: Option<String>,
}

/// ACL action kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AclActionType {
    /// Allow matching clients.
    Allow,
    /// Deny matching clients.
    Deny,
}

/// Action of an ACL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AclAction {
    /// Kind of action.
    #[serde(rename = "type")]
    pub action_type: AclActionType,
}

/// Match condition of an ACL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AclMatch {
    /// Client IP ranges the ACL matches.
    #[serde(default)]
    pub ip_subnet: Vec<String>,
}

/// An ordered allow/deny rule evaluated per frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acl {
    /// Unique identifier.
    pub id: String,
    /// Name of the ACL.
    pub name: String,
    /// Evaluation priority, lower is evaluated first.
    pub index: i32,
    /// Action applied on match.
    pub action: AclAction,
    /// Match condition.
    #[serde(default, rename = "match")]
    pub acl_match: Option<AclMatch>,
}

/// Attachment of a load balancer to a private network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LbPrivateNetwork {
    /// Private network side of the attachment.
    pub private_network_id: String,
}

// ---------------------------------------------------------------------------
// Instance

/// Lifecycle state of an instance server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServerState {
    /// Booted and running.
    #[serde(rename = "running")]
    Running,
    /// Powered off.
    #[serde(rename = "stopped")]
    Stopped,
    /// Stopped but still allocated on the hypervisor.
    #[serde(rename = "stopped in place")]
    StoppedInPlace,
    /// Boot in progress.
    #[serde(rename = "starting")]
    Starting,
    /// Shutdown in progress.
    #[serde(rename = "stopping")]
    Stopping,
    /// Locked by the provider; no action possible.
    #[serde(rename = "locked")]
    Locked,
}

/// Action that can be performed on a server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServerAction {
    /// Boot the server.
    Poweron,
    /// Shut the server down cleanly.
    Poweroff,
    /// Delete the server and its volumes.
    Terminate,
}

/// Volume type of an instance volume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VolumeType {
    /// Local SSD.
    #[serde(rename = "l_ssd")]
    LSsd,
    /// Block SSD.
    #[serde(rename = "b_ssd")]
    BSsd,
}

/// A volume as attached to a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeServer {
    /// Unique identifier.
    pub id: String,
    /// Whether this is the boot volume.
    #[serde(default)]
    pub boot: bool,
    /// Volume type.
    #[serde(default)]
    pub volume_type: Option<VolumeType>,
}

/// Public IP as attached to a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerIp {
    /// Unique identifier.
    pub id: String,
    /// IPv4 address.
    pub address: String,
    /// True when the IP is dynamic (released with the server) rather than a
    /// manually attached flexible IP.
    #[serde(default)]
    pub dynamic: bool,
}

/// An instance server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// Unique identifier.
    pub id: String,
    /// Name of the server.
    pub name: String,
    /// Lifecycle state.
    pub state: ServerState,
    /// Commercial type (e.g. PRO2-S).
    pub commercial_type: String,
    /// Tags of the server.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Public IP attached to the server, if any.
    #[serde(default)]
    pub public_ip: Option<ServerIp>,
    /// Volumes keyed by slot ("0" is the boot slot).
    #[serde(default)]
    pub volumes: BTreeMap<String, VolumeServer>,
}

/// Request to create a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServerRequest {
    /// Name of the server.
    pub name: String,
    /// Commercial type.
    pub commercial_type: String,
    /// Image UUID.
    pub image: String,
    /// Tags of the server.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Security group to attach. Default group when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
    /// Flexible public IP to attach at creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip_id: Option<String>,
    /// Root volume size in GB.
    pub root_volume_size_gb: u64,
    /// Root volume type.
    pub root_volume_type: VolumeType,
}

/// A flexible instance IP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceIp {
    /// Unique identifier.
    pub id: String,
    /// IPv4 address.
    pub address: String,
    /// Tags of the IP.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A private NIC attaching a server to a private network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateNic {
    /// Unique identifier.
    pub id: String,
    /// Server side of the attachment.
    pub server_id: String,
    /// Private network side of the attachment.
    pub private_network_id: String,
}

// ---------------------------------------------------------------------------
// Security groups

/// Default policy of a security group direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecurityGroupPolicy {
    /// Accept traffic by default.
    Accept,
    /// Drop traffic by default.
    Drop,
}

/// Action of a security group rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Accept matching packets.
    Accept,
    /// Drop matching packets.
    Drop,
}

/// Protocol matched by a security group rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RuleProtocol {
    /// Any protocol.
    #[serde(rename = "ANY")]
    Any,
    /// TCP.
    #[serde(rename = "TCP")]
    Tcp,
    /// UDP.
    #[serde(rename = "UDP")]
    Udp,
    /// ICMP.
    #[serde(rename = "ICMP")]
    Icmp,
}

/// Direction of a security group rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleDirection {
    /// Applies to incoming traffic.
    Inbound,
    /// Applies to outgoing traffic.
    Outbound,
}

/// A provider security group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroup {
    /// Unique identifier.
    pub id: String,
    /// Name of the group.
    pub name: String,
    /// Zone the group lives in.
    pub zone: String,
    /// Tags of the group.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Default inbound policy.
    pub inbound_default_policy: SecurityGroupPolicy,
    /// Default outbound policy.
    pub outbound_default_policy: SecurityGroupPolicy,
    /// Whether the provider's default security rules are enabled.
    #[serde(default)]
    pub enable_default_security: bool,
    /// Whether connection tracking is enabled.
    #[serde(default)]
    pub stateful: bool,
}

/// Request to create a security group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSecurityGroupRequest {
    /// Name of the group.
    pub name: String,
    /// Tags of the group.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Default inbound policy.
    pub inbound_default_policy: SecurityGroupPolicy,
    /// Default outbound policy.
    pub outbound_default_policy: SecurityGroupPolicy,
    /// Whether the provider's default security rules are enabled.
    pub enable_default_security: bool,
    /// Whether connection tracking is enabled.
    pub stateful: bool,
}

/// A security group rule as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// Unique identifier.
    pub id: String,
    /// Direction the rule applies to.
    pub direction: RuleDirection,
    /// Action applied on match.
    pub action: RuleAction,
    /// Protocol matched.
    pub protocol: RuleProtocol,
    /// Source/destination range in CIDR notation.
    pub ip_range: String,
    /// Lower bound of the destination port range.
    #[serde(default)]
    pub dest_port_from: Option<u32>,
    /// Upper bound of the destination port range.
    #[serde(default)]
    pub dest_port_to: Option<u32>,
    /// 1-indexed position of the rule.
    pub position: u32,
}

/// A rule in a whole-set replacement request. Rules are 1-indexed by
/// position; inbound rules are numbered first, outbound rules continue the
/// sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetSecurityGroupRule {
    /// Direction the rule applies to.
    pub direction: RuleDirection,
    /// Action applied on match.
    pub action: RuleAction,
    /// Protocol matched.
    pub protocol: RuleProtocol,
    /// Source/destination range in CIDR notation.
    pub ip_range: String,
    /// Lower bound of the destination port range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_port_from: Option<u32>,
    /// Upper bound of the destination port range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_port_to: Option<u32>,
    /// 1-indexed position of the rule.
    pub position: u32,
}

// ---------------------------------------------------------------------------
// Marketplace and IPAM

/// A zone-local marketplace image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalImage {
    /// Image UUID usable in server creation.
    pub id: String,
    /// Marketplace label (e.g. ubuntu_jammy).
    #[serde(default)]
    pub label: Option<String>,
}

/// An address known to the IP address management subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpamIp {
    /// Unique identifier.
    pub id: String,
    /// Address in CIDR notation (e.g. 10.0.0.3/22).
    pub address: String,
}
