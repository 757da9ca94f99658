//! Private network reconciliation.
//!
//! The private network is region-wide. When the spec provides an existing
//! network ID the controller only validates it; otherwise it creates one
//! named after the cluster. Machines rely on managed DHCP for addressing, so
//! a network without DHCP is a permanent configuration error.

use crate::error::ControllerError;
use crate::scope::ClusterScope;
use scaleway_client::{PrivateNetwork, ScalewayError};
use tracing::info;

pub async fn reconcile(scope: &mut ClusterScope) -> Result<(), ControllerError> {
    let Some(spec) = scope.private_network_spec() else {
        return Ok(());
    };
    if !spec.enabled {
        return Ok(());
    }

    let region = scope.region();
    let pn: PrivateNetwork = match &spec.id {
        Some(id) => scope.client.get_private_network(&region, id).await?,
        None => {
            let name = scope.resource_name();
            match scope.client.find_private_network_by_name(&region, &name).await {
                Ok(pn) => pn,
                Err(ScalewayError::NoItemFound) => {
                    info!(cluster = scope.name(), %region, "Creating private network");
                    let subnets: Vec<String> = spec.subnet.clone().into_iter().collect();
                    scope
                        .client
                        .create_private_network(&region, &name, &subnets, &scope.tags())
                        .await?
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    if !pn.dhcp_enabled {
        return Err(ControllerError::InvalidConfig(format!(
            "private network {} does not have DHCP enabled, machines cannot be addressed",
            pn.id
        )));
    }

    scope.set_private_network_id(pn.id);
    Ok(())
}

/// Delete the private network if this controller created it.
///
/// Propagates the provider's precondition error while attachments still
/// exist: the caller requeues until dependent resources are gone.
pub async fn delete(scope: &ClusterScope) -> Result<(), ControllerError> {
    if !scope.should_manage_private_network() {
        return Ok(());
    }

    let region = scope.region();
    match scope
        .client
        .find_private_network_by_name(&region, &scope.resource_name())
        .await
    {
        Ok(pn) => {
            // Gateway attachments hold the network open. Managed gateways
            // are gone by now, but an attachment to a user-provided gateway
            // was still created by this controller and must be detached.
            let attachments = scope
                .client
                .find_gateways_by_private_network_id(&scope.zones(), &pn.id)
                .await?;
            for (zone, gn) in attachments {
                info!(cluster = scope.name(), %zone, id = %gn.id, "Detaching gateway");
                scope.client.delete_gateway_network(&zone, &gn.id).await?;
            }
            info!(cluster = scope.name(), id = %pn.id, "Deleting private network");
            scope.client.delete_private_network(&region, &pn.id).await?;
            Ok(())
        }
        Err(ScalewayError::NoItemFound) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ClusterScope;
    use kube::api::ObjectMeta;
    use scaleway_client::{MockScalewayClient, Region, Zone};
    use std::sync::Arc;

    fn scope_with(network: Option<crds::NetworkSpec>) -> (ClusterScope, Arc<MockScalewayClient>) {
        let client = Arc::new(MockScalewayClient::new());
        let cluster = crds::ScalewayCluster {
            metadata: ObjectMeta {
                name: Some("demo".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: crds::ScalewayClusterSpec {
                control_plane_endpoint: None,
                failure_domains: None,
                region: "fr-par".to_string(),
                network,
                control_plane_load_balancer: None,
                scaleway_secret_name: "scaleway-secret".to_string(),
            },
            status: None,
        };
        (ClusterScope::new(cluster, client.clone()), client)
    }

    fn enabled_network() -> Option<crds::NetworkSpec> {
        Some(crds::NetworkSpec {
            private_network: Some(crds::PrivateNetworkSpec {
                enabled: true,
                id: None,
                subnet: Some("10.0.0.0/22".to_string()),
            }),
            public_gateway: None,
            security_groups: vec![],
        })
    }

    #[tokio::test]
    async fn creates_network_once() {
        let (mut scope, client) = scope_with(enabled_network());

        reconcile(&mut scope).await.unwrap();
        assert!(scope.private_network_id().is_some());
        assert_eq!(
            client.mutation_log(),
            vec!["create_private_network caps-demo"]
        );

        // A second pass finds the network and performs no writes.
        client.clear_mutation_log();
        reconcile(&mut scope).await.unwrap();
        assert!(client.mutation_log().is_empty());
    }

    #[tokio::test]
    async fn skips_when_disabled() {
        let (mut scope, client) = scope_with(None);
        reconcile(&mut scope).await.unwrap();
        assert!(scope.private_network_id().is_none());
        assert!(client.mutation_log().is_empty());
    }

    #[tokio::test]
    async fn rejects_existing_network_without_dhcp() {
        let client = Arc::new(MockScalewayClient::new());
        client.seed_private_network(
            &Region::from("fr-par"),
            scaleway_client::PrivateNetwork {
                id: "pn-legacy".to_string(),
                name: "legacy".to_string(),
                dhcp_enabled: false,
                subnets: vec![],
                tags: vec![],
            },
        );
        let (mut scope, _) = scope_with(Some(crds::NetworkSpec {
            private_network: Some(crds::PrivateNetworkSpec {
                enabled: true,
                id: Some("pn-legacy".to_string()),
                subnet: None,
            }),
            public_gateway: None,
            security_groups: vec![],
        }));
        scope.client = client;

        let err = reconcile(&mut scope).await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn delete_leaves_unmanaged_network_alone() {
        let (scope, client) = scope_with(Some(crds::NetworkSpec {
            private_network: Some(crds::PrivateNetworkSpec {
                enabled: true,
                id: Some("pn-legacy".to_string()),
                subnet: None,
            }),
            public_gateway: None,
            security_groups: vec![],
        }));
        delete(&scope).await.unwrap();
        assert!(client.mutation_log().is_empty());
    }

    #[tokio::test]
    async fn delete_detaches_remaining_gateways() {
        let (mut scope, client) = scope_with(enabled_network());
        reconcile(&mut scope).await.unwrap();

        // Attachment to a gateway this controller does not manage.
        let zone = Zone::from("fr-par-1");
        scope
            .client
            .create_gateway_network(&zone, "gw-user", "pn-1", true, true, true)
            .await
            .unwrap();

        client.clear_mutation_log();
        delete(&scope).await.unwrap();
        let log = client.mutation_log();
        assert_eq!(log.len(), 2);
        assert!(log[0].starts_with("delete_gateway_network"));
        assert_eq!(log[1], "delete_private_network pn-1");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (mut scope, client) = scope_with(enabled_network());
        reconcile(&mut scope).await.unwrap();

        client.clear_mutation_log();
        delete(&scope).await.unwrap();
        assert_eq!(client.mutation_log(), vec!["delete_private_network pn-1"]);

        client.clear_mutation_log();
        delete(&scope).await.unwrap();
        assert!(client.mutation_log().is_empty());
    }
}
