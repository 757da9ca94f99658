//! Reconciliation scopes.
//!
//! A scope bundles an object under reconciliation with the Scaleway client
//! and a working copy of its status. Services mutate the working copy, the
//! reconciler flushes it back to the API server once at the end of the pass.
//! Scopes never talk to the Kubernetes API themselves, which keeps the
//! services testable against a mock Scaleway client.

use crate::error::{ControllerError, NotReadyReason};
use crds::{
    LoadBalancerSpec, NetworkSpec, PrivateNetworkSpec, PublicGatewaySpec, ScalewayCluster,
    ScalewayClusterStatus, ScalewayMachine, ScalewayMachineStatus,
};
use kube::ResourceExt;
use scaleway_client::{Region, ScalewayClientTrait, Zone};
use std::sync::Arc;

/// Prefix of every cloud resource name managed by the controller.
const NAME_PREFIX: &str = "caps";

/// Tag marking a resource as owned by a cluster.
pub const TAG_CLUSTER: &str = "caps-cluster";

/// Tag marking a resource as owned by a machine.
pub const TAG_NODE: &str = "caps-node";

/// Scope of a ScalewayCluster reconciliation.
pub struct ClusterScope {
    pub cluster: ScalewayCluster,
    pub client: Arc<dyn ScalewayClientTrait>,
    /// Working copy of the status, flushed by the reconciler.
    pub status: ScalewayClusterStatus,
    name: String,
}

impl ClusterScope {
    pub fn new(cluster: ScalewayCluster, client: Arc<dyn ScalewayClientTrait>) -> Self {
        let name = cluster.name_any();
        let status = cluster.status.clone().unwrap_or_default();
        Self {
            cluster,
            client,
            status,
            name,
        }
    }

    /// Name of the ScalewayCluster object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name given to cloud resources owned by this cluster.
    pub fn resource_name(&self) -> String {
        format!("{NAME_PREFIX}-{}", self.name)
    }

    /// Tags applied to cloud resources owned by this cluster.
    pub fn tags(&self) -> Vec<String> {
        vec![format!("{TAG_CLUSTER}={}", self.name)]
    }

    pub fn region(&self) -> Region {
        Region::from(self.cluster.spec.region.as_str())
    }

    /// Zones cluster resources may land in: the declared failure domains, or
    /// every zone of the region.
    pub fn zones(&self) -> Vec<Zone> {
        match &self.cluster.spec.failure_domains {
            Some(domains) if !domains.is_empty() => {
                domains.iter().map(|d| Zone::from(d.as_str())).collect()
            }
            _ => self.region().zones(),
        }
    }

    /// Default zone for single-zone resources: first failure domain, or the
    /// first zone of the region.
    fn default_zone(&self) -> Zone {
        self.zones()
            .into_iter()
            .next()
            .unwrap_or_else(|| self.region().default_zone())
    }

    fn network(&self) -> NetworkSpec {
        self.cluster.spec.network.clone().unwrap_or_default()
    }

    pub fn private_network_spec(&self) -> Option<PrivateNetworkSpec> {
        self.network().private_network
    }

    pub fn has_private_network(&self) -> bool {
        self.private_network_spec().is_some_and(|pn| pn.enabled)
    }

    /// True when the private network lifecycle belongs to this controller.
    pub fn should_manage_private_network(&self) -> bool {
        self.private_network_spec()
            .is_some_and(|pn| pn.enabled && pn.id.is_none())
    }

    /// ID of the private network, from the working status.
    pub fn private_network_id(&self) -> Option<String> {
        self.status
            .network
            .as_ref()
            .and_then(|n| n.private_network_id.clone())
    }

    pub fn set_private_network_id(&mut self, id: String) {
        self.status
            .network
            .get_or_insert_with(Default::default)
            .private_network_id = Some(id);
    }

    pub fn public_gateway_spec(&self) -> Option<PublicGatewaySpec> {
        self.network().public_gateway
    }

    pub fn has_public_gateway(&self) -> bool {
        self.public_gateway_spec().is_some_and(|gw| gw.enabled)
    }

    /// True when the public gateway lifecycle belongs to this controller.
    pub fn should_manage_public_gateway(&self) -> bool {
        self.public_gateway_spec()
            .is_some_and(|gw| gw.enabled && gw.id.is_none())
    }

    pub fn public_gateway_zone(&self) -> Zone {
        self.public_gateway_spec()
            .and_then(|gw| gw.zone)
            .map(|z| Zone::from(z.as_str()))
            .unwrap_or_else(|| self.default_zone())
    }

    pub fn set_public_gateway_id(&mut self, id: String) {
        self.status
            .network
            .get_or_insert_with(Default::default)
            .public_gateway_id = Some(id);
    }

    pub fn security_groups(&self) -> Vec<crds::SecurityGroup> {
        self.network().security_groups
    }

    /// Zone-independent name of a security group declared in the spec.
    pub fn security_group_name(&self, short_name: &str) -> String {
        format!("{}-{}", self.resource_name(), short_name)
    }

    pub fn load_balancer_spec(&self) -> LoadBalancerSpec {
        self.cluster
            .spec
            .control_plane_load_balancer
            .clone()
            .unwrap_or_default()
    }

    pub fn load_balancer_zone(&self) -> Zone {
        self.load_balancer_spec()
            .zone
            .map(|z| Zone::from(z.as_str()))
            .unwrap_or_else(|| self.default_zone())
    }

    pub fn set_control_plane_endpoint(&mut self, host: String, port: u32) {
        self.cluster.spec.control_plane_endpoint = Some(crds::ApiEndpoint { host, port });
    }

    pub fn control_plane_endpoint(&self) -> Option<crds::ApiEndpoint> {
        self.cluster.spec.control_plane_endpoint.clone()
    }
}

/// Scope of a ScalewayMachine reconciliation.
pub struct MachineScope {
    pub machine: ScalewayMachine,
    /// Scope of the owner cluster, sharing the same Scaleway client.
    pub cluster: ClusterScope,
    /// Raw bootstrap payload, prefetched by the reconciler.
    pub bootstrap_data: Option<String>,
    /// Working copy of the status, flushed by the reconciler.
    pub status: ScalewayMachineStatus,
    name: String,
}

impl MachineScope {
    pub fn new(
        machine: ScalewayMachine,
        cluster: ClusterScope,
        bootstrap_data: Option<String>,
    ) -> Self {
        let name = machine.name_any();
        let status = machine.status.clone().unwrap_or_default();
        Self {
            machine,
            cluster,
            bootstrap_data,
            status,
            name,
        }
    }

    pub fn client(&self) -> &Arc<dyn ScalewayClientTrait> {
        &self.cluster.client
    }

    /// Name of the ScalewayMachine object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name given to the instance and its attached resources.
    pub fn resource_name(&self) -> String {
        format!("{NAME_PREFIX}-{}", self.name)
    }

    /// Tags applied to the instance and its attached resources.
    pub fn tags(&self) -> Vec<String> {
        vec![
            format!("{TAG_CLUSTER}={}", self.cluster.name()),
            format!("{TAG_NODE}={}", self.name),
        ]
    }

    /// Zone the instance lives in: the declared failure domain, or the
    /// cluster default.
    pub fn zone(&self) -> Zone {
        self.machine
            .spec
            .failure_domain
            .as_deref()
            .map(Zone::from)
            .unwrap_or_else(|| {
                self.cluster
                    .zones()
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| self.cluster.region().default_zone())
            })
    }

    pub fn is_control_plane(&self) -> bool {
        self.machine.spec.control_plane.unwrap_or(false)
    }

    /// Provider ID of a server in a zone: scaleway://instance/<zone>/<id>.
    pub fn provider_id(&self, zone: &Zone, server_id: &str) -> String {
        format!("scaleway://instance/{zone}/{server_id}")
    }

    /// Root volume size in GB, defaulting to 20.
    pub fn root_volume_size_gb(&self) -> u64 {
        self.machine.spec.root_volume_size.unwrap_or(20)
    }

    /// Root volume kind, defaulting to block storage.
    pub fn root_volume_type(&self) -> scaleway_client::VolumeType {
        self.machine
            .spec
            .root_volume_type
            .unwrap_or(crds::RootVolumeType::Block)
            .to_volume_type()
    }

    /// Bootstrap payload with node placeholders substituted.
    ///
    /// `[[[ .NodeIP ]]]` and `[[[ .ProviderID ]]]` are replaced with the
    /// node's IP and provider ID.
    pub fn render_bootstrap_data(
        &self,
        node_ip: &str,
        provider_id: &str,
    ) -> Result<String, ControllerError> {
        let payload = self
            .bootstrap_data
            .as_deref()
            .ok_or(ControllerError::NotReady(NotReadyReason::BootstrapData))?;
        Ok(payload
            .replace("[[[ .NodeIP ]]]", node_ip)
            .replace("[[[ .ProviderID ]]]", provider_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use scaleway_client::MockScalewayClient;

    fn cluster(name: &str, spec: crds::ScalewayClusterSpec) -> ScalewayCluster {
        ScalewayCluster {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    fn base_spec() -> crds::ScalewayClusterSpec {
        crds::ScalewayClusterSpec {
            control_plane_endpoint: None,
            failure_domains: None,
            region: "fr-par".to_string(),
            network: None,
            control_plane_load_balancer: None,
            scaleway_secret_name: "scaleway-secret".to_string(),
        }
    }

    #[test]
    fn cluster_resource_name_is_prefixed() {
        let scope = ClusterScope::new(
            cluster("demo", base_spec()),
            Arc::new(MockScalewayClient::new()),
        );
        assert_eq!(scope.resource_name(), "caps-demo");
        assert_eq!(scope.tags(), vec!["caps-cluster=demo".to_string()]);
    }

    #[test]
    fn zones_default_to_region() {
        let scope = ClusterScope::new(
            cluster("demo", base_spec()),
            Arc::new(MockScalewayClient::new()),
        );
        let zones: Vec<String> = scope.zones().iter().map(ToString::to_string).collect();
        assert_eq!(zones, vec!["fr-par-1", "fr-par-2", "fr-par-3"]);
    }

    #[test]
    fn zones_honor_failure_domains() {
        let mut spec = base_spec();
        spec.failure_domains = Some(vec!["fr-par-2".to_string()]);
        let scope = ClusterScope::new(
            cluster("demo", spec),
            Arc::new(MockScalewayClient::new()),
        );
        assert_eq!(scope.load_balancer_zone().to_string(), "fr-par-2");
        assert_eq!(scope.public_gateway_zone().to_string(), "fr-par-2");
    }

    fn machine(name: &str, spec: crds::ScalewayMachineSpec) -> ScalewayMachine {
        ScalewayMachine {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    fn machine_spec() -> crds::ScalewayMachineSpec {
        crds::ScalewayMachineSpec {
            cluster_name: "demo".to_string(),
            provider_id: None,
            image: "ubuntu_jammy".to_string(),
            commercial_type: "PRO2-S".to_string(),
            root_volume_size: None,
            root_volume_type: None,
            public_ip: None,
            security_group_name: None,
            control_plane: None,
            failure_domain: None,
            bootstrap_secret_name: Some("machine-bootstrap".to_string()),
        }
    }

    #[test]
    fn machine_tags_and_provider_id() {
        let cluster_scope = ClusterScope::new(
            cluster("demo", base_spec()),
            Arc::new(MockScalewayClient::new()),
        );
        let scope = MachineScope::new(machine("node-0", machine_spec()), cluster_scope, None);
        assert_eq!(scope.resource_name(), "caps-node-0");
        assert_eq!(
            scope.tags(),
            vec!["caps-cluster=demo".to_string(), "caps-node=node-0".to_string()]
        );
        assert_eq!(
            scope.provider_id(&Zone::from("fr-par-1"), "srv-1"),
            "scaleway://instance/fr-par-1/srv-1"
        );
        assert_eq!(scope.zone().to_string(), "fr-par-1");
        assert_eq!(scope.root_volume_size_gb(), 20);
    }

    #[test]
    fn root_volume_defaults_to_block_storage() {
        let cluster_scope = ClusterScope::new(
            cluster("demo", base_spec()),
            Arc::new(MockScalewayClient::new()),
        );
        let scope = MachineScope::new(machine("node-0", machine_spec()), cluster_scope, None);
        assert_eq!(scope.root_volume_type(), scaleway_client::VolumeType::BSsd);

        let mut spec = machine_spec();
        spec.root_volume_type = Some(crds::RootVolumeType::Local);
        let cluster_scope = ClusterScope::new(
            cluster("demo", base_spec()),
            Arc::new(MockScalewayClient::new()),
        );
        let scope = MachineScope::new(machine("node-0", spec), cluster_scope, None);
        assert_eq!(scope.root_volume_type(), scaleway_client::VolumeType::LSsd);
    }

    #[test]
    fn bootstrap_rendering_substitutes_placeholders() {
        let cluster_scope = ClusterScope::new(
            cluster("demo", base_spec()),
            Arc::new(MockScalewayClient::new()),
        );
        let scope = MachineScope::new(
            machine("node-0", machine_spec()),
            cluster_scope,
            Some("ip=[[[ .NodeIP ]]] id=[[[ .ProviderID ]]]".to_string()),
        );
        let rendered = scope
            .render_bootstrap_data("10.0.0.3", "scaleway://instance/fr-par-1/srv-1")
            .unwrap();
        assert_eq!(rendered, "ip=10.0.0.3 id=scaleway://instance/fr-par-1/srv-1");
    }

    #[test]
    fn bootstrap_rendering_requires_payload() {
        let cluster_scope = ClusterScope::new(
            cluster("demo", base_spec()),
            Arc::new(MockScalewayClient::new()),
        );
        let scope = MachineScope::new(machine("node-0", machine_spec()), cluster_scope, None);
        let err = scope.render_bootstrap_data("10.0.0.3", "x").unwrap_err();
        assert!(matches!(
            err,
            ControllerError::NotReady(NotReadyReason::BootstrapData)
        ));
    }
}
