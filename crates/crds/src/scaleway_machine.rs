//! ScalewayMachine CRD
//!
//! Declares a single compute instance belonging to a ScalewayCluster.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer installed on ScalewayMachine objects while the instance exists.
pub const MACHINE_FINALIZER: &str = "scalewaymachine.infrastructure.cluster.x-k8s.io";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "ScalewayMachine",
    namespaced,
    status = "ScalewayMachineStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ScalewayMachineSpec {
    /// Name of the ScalewayCluster this machine belongs to, in the same
    /// namespace.
    pub cluster_name: String,

    /// Provider ID of the instance, set once the instance is created.
    /// Format: scaleway://instance/<zone>/<server-id>
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Label (e.g. ubuntu_jammy) or UUID of the image that will be used to
    /// create the instance.
    pub image: String,

    /// Commercial type of the instance (e.g. PRO2-S).
    #[serde(rename = "type")]
    pub commercial_type: String,

    /// Size of the root volume in GB. Defaults to 20 GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_volume_size: Option<u64>,

    /// Type of the root volume. Can be local or block. Note that not all
    /// commercial types support local volumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_volume_type: Option<RootVolumeType>,

    /// Set to true to create and attach a public IP to the instance.
    /// Defaults to false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<bool>,

    /// Name of the security group as specified in the ScalewayCluster object.
    /// If not set, the instance is attached to the default security group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_name: Option<String>,

    /// True when this machine hosts a control-plane node. Control-plane
    /// machines are registered in the control-plane load balancer backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<bool>,

    /// Zone where the instance is created. Defaults to the first zone of the
    /// cluster region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_domain: Option<String>,

    /// Name of the secret holding the raw bootstrap payload for this machine,
    /// under the "value" key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_secret_name: Option<String>,
}

/// Root volume kind of an instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RootVolumeType {
    /// Local SSD storage.
    Local,
    /// Block SSD storage.
    Block,
}

impl RootVolumeType {
    /// Provider volume type for this root volume kind.
    pub fn to_volume_type(self) -> scaleway_client::VolumeType {
        match self {
            Self::Local => scaleway_client::VolumeType::LSsd,
            Self::Block => scaleway_client::VolumeType::BSsd,
        }
    }
}

/// Observed state of a ScalewayMachine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScalewayMachineStatus {
    /// Ready is true when the instance is created, addressed and started.
    #[serde(default)]
    pub ready: bool,

    /// Addresses of the node, external address first when present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<MachineAddress>,
}

/// A single address of a machine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineAddress {
    /// Kind of address.
    #[serde(rename = "type")]
    pub address_type: MachineAddressType,

    /// The address itself.
    pub address: String,
}

/// Kind of machine address.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum MachineAddressType {
    /// Address reachable from outside the private network.
    ExternalIP,
    /// Address on the private network.
    InternalIP,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_volume_kinds_map_to_provider_types() {
        assert_eq!(
            RootVolumeType::Local.to_volume_type(),
            scaleway_client::VolumeType::LSsd
        );
        assert_eq!(
            RootVolumeType::Block.to_volume_type(),
            scaleway_client::VolumeType::BSsd
        );
    }
}
