//! ScalewayCluster reconciliation.

use super::{is_not_found, Reconciler, DRAIN_REQUEUE_SECS, NOT_READY_REQUEUE_SECS};
use crate::error::ControllerError;
use crate::scope::ClusterScope;
use crate::service::{loadbalancer, private_network, public_gateway, security_group};
use crds::{ScalewayCluster, CLUSTER_FINALIZER};
use kube::api::{Patch, PatchParams};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use scaleway_client::ScalewayError;
use std::time::Duration;
use tracing::{debug, info, warn};

impl Reconciler {
    /// Reconcile a single ScalewayCluster.
    pub async fn reconcile_scaleway_cluster(
        &self,
        cluster: &ScalewayCluster,
    ) -> Result<Action, ControllerError> {
        let name = cluster.name_any();

        if cluster.metadata.deletion_timestamp.is_some() {
            return self.delete_scaleway_cluster(cluster).await;
        }

        let cluster = self
            .ensure_finalizer(&self.cluster_api, cluster, CLUSTER_FINALIZER)
            .await?;

        let client = self.scaleway_client_for(&cluster).await?;
        let mut scope = ClusterScope::new(cluster.clone(), client);

        let result = reconcile_cluster_resources(&mut scope).await;

        // Flush the working status even when a dependency is not ready, so
        // partially created resource IDs survive the requeue.
        self.flush_cluster_status(&scope).await?;
        self.flush_control_plane_endpoint(&cluster, &scope).await?;

        match result {
            Ok(()) => {
                info!(cluster = %name, "Cluster infrastructure is ready");
                Ok(Action::await_change())
            }
            Err(ControllerError::NotReady(reason)) => {
                debug!(cluster = %name, %reason, "Cluster not ready, requeuing");
                Ok(Action::requeue(Duration::from_secs(NOT_READY_REQUEUE_SECS)))
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_scaleway_cluster(
        &self,
        cluster: &ScalewayCluster,
    ) -> Result<Action, ControllerError> {
        let name = cluster.name_any();
        if !cluster.finalizers().iter().any(|f| f == CLUSTER_FINALIZER) {
            return Ok(Action::await_change());
        }

        // Machines clean up their own cloud resources through their
        // finalizer. Their instances sit on the network being torn down, so
        // they must be fully gone first.
        let machines = self.machines_of_cluster(&name).await?;
        if machines > 0 {
            info!(cluster = %name, machines, "Waiting for machines before teardown");
            return Ok(Action::requeue(Duration::from_secs(DRAIN_REQUEUE_SECS)));
        }

        info!(cluster = %name, "Deleting cluster infrastructure");
        let client = self.scaleway_client_for(cluster).await?;
        let scope = ClusterScope::new(cluster.clone(), client);

        match delete_cluster_resources(&scope).await {
            Ok(()) => {}
            // Machines still hold ports on the private network. Their own
            // deletion will release them, retry once they are gone.
            Err(ControllerError::Scaleway(ScalewayError::Precondition(msg))) => {
                warn!(cluster = %name, %msg, "Private network still in use, requeuing");
                return Ok(Action::requeue(Duration::from_secs(DRAIN_REQUEUE_SECS)));
            }
            Err(e) => return Err(e),
        }

        self.remove_finalizer(&self.cluster_api, cluster, CLUSTER_FINALIZER)
            .await?;
        info!(cluster = %name, "Cluster infrastructure deleted");
        Ok(Action::await_change())
    }

    /// Number of ScalewayMachines belonging to a cluster.
    async fn machines_of_cluster(&self, cluster_name: &str) -> Result<usize, ControllerError> {
        let machines = self.machine_api.list(&Default::default()).await?;
        Ok(machines
            .items
            .iter()
            .filter(|m| m.spec.cluster_name == cluster_name)
            .count())
    }

    async fn flush_cluster_status(&self, scope: &ClusterScope) -> Result<(), ControllerError> {
        // The resourceVersion makes the patch fail on a concurrent edit
        // instead of overwriting it. The retriggered reconcile starts from
        // the fresh object.
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": scope.cluster.metadata.resource_version },
            "status": scope.status,
        });
        match self
            .cluster_api
            .patch_status(
                scope.name(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
        {
            Ok(_) => Ok(()),
            // The object can disappear mid-pass, nothing left to record.
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the control-plane endpoint once the load balancer assigned it.
    async fn flush_control_plane_endpoint(
        &self,
        cluster: &ScalewayCluster,
        scope: &ClusterScope,
    ) -> Result<(), ControllerError> {
        let Some(endpoint) = scope.control_plane_endpoint() else {
            return Ok(());
        };
        if cluster.spec.control_plane_endpoint.as_ref() == Some(&endpoint) {
            return Ok(());
        }
        let patch = serde_json::json!({ "spec": { "controlPlaneEndpoint": endpoint } });
        match self
            .cluster_api
            .patch(
                scope.name(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Bring every cluster-scoped cloud resource in line with the spec and mark
/// the working status ready.
async fn reconcile_cluster_resources(scope: &mut ClusterScope) -> Result<(), ControllerError> {
    private_network::reconcile(scope).await?;
    security_group::reconcile(scope).await?;
    public_gateway::reconcile(scope).await?;
    loadbalancer::reconcile(scope).await?;

    scope.status.failure_domains = scope
        .zones()
        .iter()
        .map(|zone| (zone.to_string(), true))
        .collect();
    scope.status.ready = true;
    Ok(())
}

/// Tear down the cluster-scoped cloud resources.
///
/// The private network goes last: it rejects deletion with a precondition
/// failure while anything still holds a port on it, and the caller requeues
/// on that error. Everything in front of it must already be gone by then.
async fn delete_cluster_resources(scope: &ClusterScope) -> Result<(), ControllerError> {
    loadbalancer::delete(scope).await?;
    public_gateway::delete(scope).await?;
    security_group::delete(scope).await?;
    private_network::delete(scope).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use scaleway_client::MockScalewayClient;
    use std::sync::Arc;

    fn full_cluster_scope() -> (ClusterScope, Arc<MockScalewayClient>) {
        let client = Arc::new(MockScalewayClient::new());
        let cluster = ScalewayCluster {
            metadata: ObjectMeta {
                name: Some("demo".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: crds::ScalewayClusterSpec {
                control_plane_endpoint: None,
                failure_domains: Some(vec!["fr-par-1".to_string()]),
                region: "fr-par".to_string(),
                network: Some(crds::NetworkSpec {
                    private_network: Some(crds::PrivateNetworkSpec {
                        enabled: true,
                        id: None,
                        subnet: None,
                    }),
                    public_gateway: Some(crds::PublicGatewaySpec {
                        enabled: true,
                        id: None,
                        gateway_type: None,
                        ip: None,
                        zone: None,
                    }),
                    security_groups: vec![crds::SecurityGroup {
                        name: "node".to_string(),
                        inbound: None,
                        outbound: None,
                    }],
                }),
                control_plane_load_balancer: None,
                scaleway_secret_name: "scaleway-secret".to_string(),
            },
            status: None,
        };
        (ClusterScope::new(cluster, client.clone()), client)
    }

    fn position(log: &[String], prefix: &str) -> usize {
        log.iter()
            .position(|l| l.starts_with(prefix))
            .unwrap_or_else(|| panic!("no `{prefix}` entry in {log:?}"))
    }

    #[tokio::test]
    async fn creation_walks_network_groups_gateway_then_lb() {
        let (mut scope, client) = full_cluster_scope();
        reconcile_cluster_resources(&mut scope).await.unwrap();

        let log = client.mutation_log();
        let pn = position(&log, "create_private_network");
        let sg = position(&log, "create_security_group");
        let gw = position(&log, "create_gateway caps-demo");
        let lb = position(&log, "create_lb");
        assert!(pn < sg, "security groups before the private network: {log:?}");
        assert!(sg < gw, "gateway before the security groups: {log:?}");
        assert!(gw < lb, "load balancer before the gateway: {log:?}");

        assert!(scope.status.ready);
        assert_eq!(scope.status.failure_domains.get("fr-par-1"), Some(&true));
    }

    #[tokio::test]
    async fn teardown_reverses_the_creation_order() {
        let (mut scope, client) = full_cluster_scope();
        reconcile_cluster_resources(&mut scope).await.unwrap();

        client.clear_mutation_log();
        delete_cluster_resources(&scope).await.unwrap();

        let log = client.mutation_log();
        let lb = position(&log, "delete_lb");
        let gw = position(&log, "delete_gateway gw");
        let sg = position(&log, "delete_security_group");
        let pn = position(&log, "delete_private_network");
        assert!(lb < gw, "gateway deleted before the load balancer: {log:?}");
        assert!(gw < sg, "security groups deleted before the gateway: {log:?}");
        assert!(sg < pn, "private network must go last: {log:?}");
    }
}
