//! Public gateway reconciliation.
//!
//! The gateway gives machines on the private network an egress path. It is
//! created (or an existing one looked up) in a single zone, then attached to
//! the private network with DHCP, masquerade and default route propagation.
//! Attachment is keyed on the (gateway, private network) pair, so a second
//! pass performs no writes.

use crate::error::ControllerError;
use crate::scope::ClusterScope;
use scaleway_client::{Gateway, ScalewayError, Zone};
use tracing::info;

const DEFAULT_GATEWAY_TYPE: &str = "VPC-GW-S";

pub async fn reconcile(scope: &mut ClusterScope) -> Result<(), ControllerError> {
    let Some(spec) = scope.public_gateway_spec() else {
        return Ok(());
    };
    if !spec.enabled {
        return Ok(());
    }
    if !scope.has_private_network() {
        // A gateway without a private network has nothing to route.
        return Ok(());
    }
    let Some(private_network_id) = scope.private_network_id() else {
        return Err(ControllerError::InvalidConfig(
            "a public gateway requires an enabled private network".to_string(),
        ));
    };

    let zone = scope.public_gateway_zone();
    let gateway = match &spec.id {
        Some(id) => find_by_id(scope, &zone, id).await?,
        None => {
            let name = scope.resource_name();
            match scope.client.find_gateway_by_name(&zone, &name).await {
                Ok(gw) => gw,
                Err(ScalewayError::NoItemFound) => {
                    let ip_id = match &spec.ip {
                        Some(address) => {
                            scope
                                .client
                                .find_gateway_ip_by_address(&zone, address)
                                .await?
                                .id
                        }
                        None => ensure_gateway_ip(scope, &zone).await?,
                    };
                    let gateway_type = spec.gateway_type.as_deref().unwrap_or(DEFAULT_GATEWAY_TYPE);
                    info!(cluster = scope.name(), %zone, "Creating public gateway");
                    scope
                        .client
                        .create_gateway(&zone, &name, gateway_type, Some(&ip_id), &scope.tags())
                        .await?
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    let attachments = scope
        .client
        .list_gateway_networks(&zone, Some(&gateway.id), Some(&private_network_id))
        .await?;
    if attachments.is_empty() {
        info!(
            cluster = scope.name(),
            gateway = %gateway.id,
            private_network = %private_network_id,
            "Attaching public gateway to private network"
        );
        scope
            .client
            .create_gateway_network(&zone, &gateway.id, &private_network_id, true, true, true)
            .await?;
    }

    scope.set_public_gateway_id(gateway.id);
    Ok(())
}

/// Allocate a flexible IP tagged with the cluster's tags, reusing one that a
/// previous pass left behind.
async fn ensure_gateway_ip(scope: &ClusterScope, zone: &Zone) -> Result<String, ControllerError> {
    match scope.client.find_gateway_ip_by_tags(zone, &scope.tags()).await {
        Ok(ip) => Ok(ip.id),
        Err(ScalewayError::NoItemFound) => {
            info!(cluster = scope.name(), %zone, "Reserving gateway flexible IP");
            Ok(scope.client.create_gateway_ip(zone, &scope.tags()).await?.id)
        }
        Err(e) => Err(e.into()),
    }
}

async fn find_by_id(
    scope: &ClusterScope,
    zone: &Zone,
    id: &str,
) -> Result<Gateway, ControllerError> {
    scope
        .client
        .list_gateways(zone, None)
        .await?
        .into_iter()
        .find(|gw| gw.id == id)
        .ok_or_else(|| {
            ControllerError::InvalidConfig(format!("public gateway {id} not found in zone {zone}"))
        })
}

/// Delete the gateway if this controller created it, releasing its flexible
/// IP unless the spec pinned an existing one.
pub async fn delete(scope: &ClusterScope) -> Result<(), ControllerError> {
    let Some(spec) = scope.public_gateway_spec() else {
        return Ok(());
    };
    if !scope.should_manage_public_gateway() {
        return Ok(());
    }

    let zone = scope.public_gateway_zone();
    match scope
        .client
        .find_gateway_by_name(&zone, &scope.resource_name())
        .await
    {
        Ok(gateway) => {
            info!(cluster = scope.name(), id = %gateway.id, "Deleting public gateway");
            scope.client.delete_gateway(&zone, &gateway.id).await?;
        }
        Err(ScalewayError::NoItemFound) => {}
        Err(e) => return Err(e.into()),
    }

    // Release the flexible IP unless the spec pinned an existing one. Only
    // IPs tagged by this controller qualify.
    if spec.ip.is_none() {
        match scope.client.find_gateway_ip_by_tags(&zone, &scope.tags()).await {
            Ok(ip) => scope.client.delete_gateway_ip(&zone, &ip.id).await?,
            Err(ScalewayError::NoItemFound) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use scaleway_client::{GatewayIp, MockScalewayClient};
    use std::sync::Arc;

    fn scope_with_gateway(
        gateway: crds::PublicGatewaySpec,
    ) -> (ClusterScope, Arc<MockScalewayClient>) {
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
                network: Some(crds::NetworkSpec {
                    private_network: Some(crds::PrivateNetworkSpec {
                        enabled: true,
                        id: None,
                        subnet: None,
                    }),
                    public_gateway: Some(gateway),
                    security_groups: vec![],
                }),
                control_plane_load_balancer: None,
                scaleway_secret_name: "scaleway-secret".to_string(),
            },
            status: None,
        };
        let mut scope = ClusterScope::new(cluster, client.clone());
        scope.set_private_network_id("pn-1".to_string());
        (scope, client)
    }

    fn managed_gateway() -> crds::PublicGatewaySpec {
        crds::PublicGatewaySpec {
            enabled: true,
            id: None,
            gateway_type: None,
            ip: None,
            zone: None,
        }
    }

    #[tokio::test]
    async fn creates_and_attaches_gateway_once() {
        let (mut scope, client) = scope_with_gateway(managed_gateway());

        reconcile(&mut scope).await.unwrap();
        let log = client.mutation_log();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], "create_gateway_ip gwip-1");
        assert_eq!(log[1], "create_gateway caps-demo");
        assert!(log[2].starts_with("create_gateway_network"));
        assert_eq!(
            scope.status.network.as_ref().unwrap().public_gateway_id,
            Some("gw-2".to_string())
        );

        // Attach idempotency: the existing attachment is found, nothing new.
        client.clear_mutation_log();
        reconcile(&mut scope).await.unwrap();
        assert!(client.mutation_log().is_empty());
    }

    #[tokio::test]
    async fn reuses_flexible_ip_from_spec() {
        let mut gateway = managed_gateway();
        gateway.ip = Some("51.15.0.99".to_string());
        let (mut scope, client) = scope_with_gateway(gateway);
        client.seed_gateway_ip(
            &Zone::from("fr-par-1"),
            GatewayIp {
                id: "gwip-pinned".to_string(),
                address: "51.15.0.99".to_string(),
                tags: vec![],
            },
        );

        reconcile(&mut scope).await.unwrap();

        // Deleting must keep the user-provided IP.
        client.clear_mutation_log();
        delete(&scope).await.unwrap();
        let log = client.mutation_log();
        assert_eq!(log, vec!["delete_gateway gw-1"]);
    }

    #[tokio::test]
    async fn reuses_tagged_ip_from_interrupted_pass() {
        let (mut scope, client) = scope_with_gateway(managed_gateway());
        client.seed_gateway_ip(
            &Zone::from("fr-par-1"),
            GatewayIp {
                id: "gwip-leftover".to_string(),
                address: "51.15.0.7".to_string(),
                tags: vec!["caps-cluster=demo".to_string()],
            },
        );

        reconcile(&mut scope).await.unwrap();
        let log = client.mutation_log();
        assert!(log.iter().all(|entry| !entry.starts_with("create_gateway_ip")));
    }

    #[tokio::test]
    async fn delete_releases_managed_ip() {
        let (mut scope, client) = scope_with_gateway(managed_gateway());
        reconcile(&mut scope).await.unwrap();

        client.clear_mutation_log();
        delete(&scope).await.unwrap();
        let log = client.mutation_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], "delete_gateway gw-2");
        assert!(log[1].starts_with("delete_gateway_ip"));
    }

    #[tokio::test]
    async fn gateway_requires_private_network() {
        let (mut scope, _client) = scope_with_gateway(managed_gateway());
        scope.status.network = None;
        let err = reconcile(&mut scope).await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }
}
