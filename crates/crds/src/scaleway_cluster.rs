//! ScalewayCluster CRD
//!
//! Declares the cloud-side topology of a cluster: region, private network,
//! public gateway, security groups and the control-plane load balancer.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::security_group::SecurityGroup;

/// Finalizer installed on ScalewayCluster objects while cloud resources exist.
pub const CLUSTER_FINALIZER: &str = "scalewaycluster.infrastructure.cluster.x-k8s.io";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "ScalewayCluster",
    namespaced,
    status = "ScalewayClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ScalewayClusterSpec {
    /// Endpoint used to communicate with the control plane. Populated by the
    /// load balancer reconciliation once an IPv4 address is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,

    /// Zones where control-plane nodes and cluster resources (load balancer,
    /// public gateway, ...) will be created. Defaults to all zones of the region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_domains: Option<Vec<String>>,

    /// Region where the cluster will be hosted (e.g. fr-par).
    pub region: String,

    /// Network related options for the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkSpec>,

    /// Control-plane load balancer options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_load_balancer: Option<LoadBalancerSpec>,

    /// Name of the secret that contains the Scaleway client parameters.
    /// The following keys must be set: accessKey, secretKey, projectID.
    /// The following key is optional: apiURL.
    pub scaleway_secret_name: String,
}

/// Host and port of the cluster's API server.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    /// Hostname or IP address of the endpoint.
    pub host: String,

    /// Port of the endpoint.
    pub port: u32,
}

/// Network specific settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// Attach machines of the cluster to a Private Network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_network: Option<PrivateNetworkSpec>,

    /// Create or reuse a Public Gateway and attach it to the Private Network.
    /// Do not set this field if the Private Network already has an attached
    /// Public Gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_gateway: Option<PublicGatewaySpec>,

    /// Security groups created in all zones of the region of the cluster.
    /// A security group can be referenced by name in the ScalewayMachine
    /// object. A group in use by at least one machine MUST NOT be removed
    /// from this list: remove the machines first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<SecurityGroup>,
}

/// Private Network settings for the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrivateNetworkSpec {
    /// Set to true to automatically attach machines to a Private Network.
    /// The Private Network is automatically created if no existing Private
    /// Network ID is provided.
    pub enabled: bool,

    /// ID of an existing Private Network to reuse. This Private Network must
    /// have DHCP enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Optional subnet for the Private Network. Only used on newly created
    /// Private Networks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
}

/// Public Gateway settings for the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicGatewaySpec {
    /// Set to true to attach a Public Gateway to the Private Network.
    /// The Public Gateway is automatically created if no existing Public
    /// Gateway ID is provided.
    pub enabled: bool,

    /// ID of an existing Public Gateway that will be attached to the Private
    /// Network. You should also specify the zone field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Public Gateway commercial offer type. Defaults to VPC-GW-S.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub gateway_type: Option<String>,

    /// Existing flexible IP to use when creating the Public Gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Zone where to create the Public Gateway. Must be in the same region as
    /// the cluster. Defaults to the first failure domain or zone of the region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

/// Control-plane load balancer settings for the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    /// Zone where to create the load balancer. Must be in the same region as
    /// the cluster. Defaults to the first failure domain or zone of the region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// Load balancer commercial offer type. Defaults to LB-S.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub lb_type: Option<String>,

    /// Existing IP to use when creating the load balancer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// List of IP ranges allowed to access the cluster through the load
    /// balancer. When unset, all IP ranges are allowed. Public IPs of nodes
    /// and Public Gateways are automatically allowed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_ranges: Vec<String>,
}

/// Observed state of a ScalewayCluster.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScalewayClusterStatus {
    /// Ready is true when all cloud resources are created and ready.
    #[serde(default)]
    pub ready: bool,

    /// Failure domains of this cluster: zone name mapped to whether the zone
    /// hosts control-plane machines.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failure_domains: BTreeMap<String, bool>,

    /// Network status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkStatus>,
}

/// Realized network identifiers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    /// ID of the Private Network if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_network_id: Option<String>,

    /// ID of the Public Gateway if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_gateway_id: Option<String>,
}
