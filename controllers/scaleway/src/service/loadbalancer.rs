//! Control-plane load balancer reconciliation.
//!
//! One load balancer per cluster fronts the API server: a TCP backend and a
//! frontend both named `control-plane` on port 6443. Access is restricted
//! with ACLs evaluated in index order:
//!
//!   1. `allowed-ranges`  allow the ranges declared in the spec
//!   2. `public-gateway`  allow the cluster's gateway egress IP
//!   3. per-machine ACLs  allow node public IPs (machine reconciler)
//!   4. `deny-all`        deny everything else
//!
//! `allowed-ranges` and `deny-all` only exist while the spec declares
//! allowed ranges; the gateway and per-machine allows are maintained
//! whenever their address exists, so restricting the ranges never cuts off
//! the nodes.

use crate::error::{ControllerError, NotReadyReason};
use crate::scope::ClusterScope;
use scaleway_client::{
    AclActionType, HealthCheck, Lb, LbStatus, ScalewayError, Zone,
};
use std::net::Ipv4Addr;
use tracing::info;

/// Port of the API server, used for the frontend, backend and health check.
pub const CONTROL_PLANE_PORT: u32 = 6443;

/// Name of the control-plane backend and frontend.
pub const CONTROL_PLANE_NAME: &str = "control-plane";

/// ACL index of per-machine allow rules, between the cluster-level allows
/// and the final deny.
pub const ACL_MACHINE_INDEX: i32 = 3;

const DEFAULT_LB_TYPE: &str = "LB-S";
const HEALTH_CHECK_MAX_RETRIES: u32 = 5;

const ACL_ALLOWED_RANGES: (&str, i32) = ("allowed-ranges", 1);
const ACL_PUBLIC_GATEWAY: (&str, i32) = ("public-gateway", 2);
const ACL_DENY_ALL: (&str, i32) = ("deny-all", 4);

pub async fn reconcile(scope: &mut ClusterScope) -> Result<(), ControllerError> {
    let zone = scope.load_balancer_zone();
    let spec = scope.load_balancer_spec();

    let lb = ensure_lb(scope, &zone).await?;
    match lb.status {
        LbStatus::Ready => {}
        LbStatus::Error => {
            return Err(ControllerError::InvalidConfig(format!(
                "load balancer {} is in error state",
                lb.id
            )));
        }
        _ => return Err(ControllerError::NotReady(NotReadyReason::LoadBalancer)),
    }

    // The control-plane endpoint must be an IPv4: kubelets and the bootstrap
    // flow do not handle an IPv6-only endpoint.
    let ipv4 = lb
        .ip
        .iter()
        .find(|ip| ip.ip_address.parse::<Ipv4Addr>().is_ok())
        .ok_or_else(|| {
            ControllerError::InvalidConfig(format!("load balancer {} has no IPv4 address", lb.id))
        })?
        .ip_address
        .clone();

    let backend = match scope
        .client
        .find_backend_by_name(&zone, &lb.id, CONTROL_PLANE_NAME)
        .await
    {
        Ok(backend) => backend,
        Err(ScalewayError::NoItemFound) => {
            info!(cluster = scope.name(), lb = %lb.id, "Creating control-plane backend");
            scope
                .client
                .create_backend(
                    &zone,
                    &lb.id,
                    CONTROL_PLANE_NAME,
                    CONTROL_PLANE_PORT,
                    &HealthCheck {
                        port: CONTROL_PLANE_PORT,
                        check_max_retries: HEALTH_CHECK_MAX_RETRIES,
                    },
                )
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    let frontend = match scope
        .client
        .find_frontend_by_name(&zone, &lb.id, CONTROL_PLANE_NAME)
        .await
    {
        Ok(frontend) => frontend,
        Err(ScalewayError::NoItemFound) => {
            info!(cluster = scope.name(), lb = %lb.id, "Creating control-plane frontend");
            scope
                .client
                .create_frontend(&zone, &lb.id, CONTROL_PLANE_NAME, CONTROL_PLANE_PORT, &backend.id)
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    prune_extra_resources(scope, &zone, &lb.id).await?;

    reconcile_acls(scope, &zone, &frontend.id, &spec.allowed_ranges).await?;

    if let Some(private_network_id) = scope.private_network_id() {
        let attached = scope
            .client
            .list_lb_private_networks(&zone, &lb.id)
            .await?
            .iter()
            .any(|pn| pn.private_network_id == private_network_id);
        if !attached {
            info!(cluster = scope.name(), lb = %lb.id, "Attaching load balancer to private network");
            scope
                .client
                .attach_lb_private_network(&zone, &lb.id, &private_network_id)
                .await?;
        }
    }

    scope.set_control_plane_endpoint(ipv4, CONTROL_PLANE_PORT);
    Ok(())
}

async fn ensure_lb(scope: &ClusterScope, zone: &Zone) -> Result<Lb, ControllerError> {
    let spec = scope.load_balancer_spec();
    let name = scope.resource_name();
    match scope.client.find_lb_by_name(zone, &name).await {
        Ok(lb) => Ok(lb),
        Err(ScalewayError::NoItemFound) => {
            let ip_id = match &spec.ip {
                Some(address) => Some(scope.client.find_lb_ip(zone, address).await?.id),
                None => None,
            };
            let lb_type = spec.lb_type.as_deref().unwrap_or(DEFAULT_LB_TYPE);
            info!(cluster = scope.name(), %zone, "Creating control-plane load balancer");
            Ok(scope
                .client
                .create_lb(zone, &name, lb_type, ip_id.as_deref(), &scope.tags())
                .await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Remove backends and frontends not managed by this controller. Only the
/// `control-plane` pair may exist on the load balancer; anything else was
/// added out of band and would bypass the ACLs. Frontends go first since
/// they reference backends.
async fn prune_extra_resources(
    scope: &ClusterScope,
    zone: &Zone,
    lb_id: &str,
) -> Result<(), ControllerError> {
    for frontend in scope.client.list_frontends(zone, lb_id, None).await? {
        if frontend.name != CONTROL_PLANE_NAME {
            info!(cluster = scope.name(), frontend = %frontend.name, "Removing unmanaged frontend");
            scope.client.delete_frontend(zone, &frontend.id).await?;
        }
    }
    for backend in scope.client.list_backends(zone, lb_id, None).await? {
        if backend.name != CONTROL_PLANE_NAME {
            info!(cluster = scope.name(), backend = %backend.name, "Removing unmanaged backend");
            scope.client.delete_backend(zone, &backend.id).await?;
        }
    }
    Ok(())
}

/// Converge the cluster-level ACLs on the control-plane frontend.
///
/// Per-machine ACLs at [`ACL_MACHINE_INDEX`] belong to the machine
/// reconciler and are left alone.
async fn reconcile_acls(
    scope: &ClusterScope,
    zone: &Zone,
    frontend_id: &str,
    allowed_ranges: &[String],
) -> Result<(), ControllerError> {
    let restricted = !allowed_ranges.is_empty();

    let gateway_subnet = match gateway_address(scope).await? {
        Some(address) => vec![format!("{address}/32")],
        None => vec![],
    };

    let desired: [(&str, i32, AclActionType, Vec<String>); 3] = [
        (
            ACL_ALLOWED_RANGES.0,
            ACL_ALLOWED_RANGES.1,
            AclActionType::Allow,
            if restricted { allowed_ranges.to_vec() } else { vec![] },
        ),
        (
            ACL_PUBLIC_GATEWAY.0,
            ACL_PUBLIC_GATEWAY.1,
            AclActionType::Allow,
            // Maintained whenever the cluster routes through a gateway, so
            // gateway egress keeps reaching the API server the moment the
            // ranges are restricted.
            gateway_subnet,
        ),
        (
            ACL_DENY_ALL.0,
            ACL_DENY_ALL.1,
            AclActionType::Deny,
            if restricted {
                vec!["0.0.0.0/0".to_string(), "::/0".to_string()]
            } else {
                vec![]
            },
        ),
    ];

    for (name, index, action, subnets) in desired {
        let existing = match scope.client.find_acl_by_name(zone, frontend_id, name).await {
            Ok(acl) => Some(acl),
            Err(ScalewayError::NoItemFound) => None,
            Err(e) => return Err(e.into()),
        };
        match (existing, subnets.is_empty()) {
            (Some(acl), true) => {
                info!(cluster = scope.name(), acl = name, "Removing ACL");
                scope.client.delete_acl(zone, &acl.id).await?;
            }
            (Some(acl), false) => {
                let current_subnets = acl
                    .acl_match
                    .as_ref()
                    .map(|m| m.ip_subnet.clone())
                    .unwrap_or_default();
                if acl.index != index
                    || acl.action.action_type != action
                    || current_subnets != subnets
                {
                    info!(cluster = scope.name(), acl = name, "Updating ACL");
                    scope
                        .client
                        .update_acl(zone, &acl.id, name, index, action, &subnets)
                        .await?;
                }
            }
            (None, false) => {
                info!(cluster = scope.name(), acl = name, "Creating ACL");
                scope
                    .client
                    .create_acl(zone, frontend_id, name, index, action, &subnets)
                    .await?;
            }
            (None, true) => {}
        }
    }
    Ok(())
}

/// Public address of the cluster's gateway, if one exists.
async fn gateway_address(scope: &ClusterScope) -> Result<Option<String>, ControllerError> {
    let Some(spec) = scope.public_gateway_spec() else {
        return Ok(None);
    };
    if !spec.enabled {
        return Ok(None);
    }
    let zone = scope.public_gateway_zone();
    let gateway = match &spec.id {
        Some(id) => scope
            .client
            .list_gateways(&zone, None)
            .await?
            .into_iter()
            .find(|gw| &gw.id == id),
        None => match scope
            .client
            .find_gateway_by_name(&zone, &scope.resource_name())
            .await
        {
            Ok(gw) => Some(gw),
            Err(ScalewayError::NoItemFound) => None,
            Err(e) => return Err(e.into()),
        },
    };
    Ok(gateway.and_then(|gw| gw.ip).map(|ip| ip.address))
}

/// Delete the load balancer, releasing its flexible IP unless the spec
/// pinned an existing one.
pub async fn delete(scope: &ClusterScope) -> Result<(), ControllerError> {
    let zone = scope.load_balancer_zone();
    let release_ip = scope.load_balancer_spec().ip.is_none();
    match scope
        .client
        .find_lb_by_name(&zone, &scope.resource_name())
        .await
    {
        Ok(lb) => {
            info!(cluster = scope.name(), id = %lb.id, "Deleting load balancer");
            scope.client.delete_lb(&zone, &lb.id, release_ip).await?;
            Ok(())
        }
        Err(ScalewayError::NoItemFound) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use scaleway_client::{LbIp, MockScalewayClient};
    use std::sync::Arc;

    fn scope_with(
        lb: Option<crds::LoadBalancerSpec>,
        gateway: bool,
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
                failure_domains: Some(vec!["fr-par-1".to_string()]),
                region: "fr-par".to_string(),
                network: gateway.then(|| crds::NetworkSpec {
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
                    security_groups: vec![],
                }),
                control_plane_load_balancer: lb,
                scaleway_secret_name: "scaleway-secret".to_string(),
            },
            status: None,
        };
        (ClusterScope::new(cluster, client.clone()), client)
    }

    #[tokio::test]
    async fn creates_lb_backend_and_frontend_once() {
        let (mut scope, client) = scope_with(None, false);

        reconcile(&mut scope).await.unwrap();
        assert_eq!(
            client.mutation_log(),
            vec![
                "create_lb caps-demo",
                "create_backend control-plane",
                "create_frontend control-plane",
            ]
        );
        let endpoint = scope.control_plane_endpoint().unwrap();
        assert_eq!(endpoint.port, 6443);
        assert!(endpoint.host.parse::<Ipv4Addr>().is_ok());

        client.clear_mutation_log();
        reconcile(&mut scope).await.unwrap();
        assert!(client.mutation_log().is_empty());
    }

    #[tokio::test]
    async fn pending_lb_is_a_transient_condition() {
        let (mut scope, client) = scope_with(None, false);
        reconcile(&mut scope).await.unwrap();
        client.set_lb_status("lb-2", LbStatus::Pending);

        let err = reconcile(&mut scope).await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::NotReady(NotReadyReason::LoadBalancer)
        ));
    }

    #[tokio::test]
    async fn ipv6_only_lb_is_rejected() {
        let (mut scope, client) = scope_with(None, false);
        let zone = Zone::from("fr-par-1");
        client.seed_lb(
            &zone,
            Lb {
                id: "lb-v6".to_string(),
                name: "caps-demo".to_string(),
                status: LbStatus::Ready,
                lb_type: Some("LB-S".to_string()),
                ip: vec![LbIp {
                    id: "lbip-v6".to_string(),
                    ip_address: "2001:db8::1".to_string(),
                }],
                tags: vec![],
            },
        );

        let err = reconcile(&mut scope).await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn acls_converge_to_declared_ranges() {
        let lb_spec = crds::LoadBalancerSpec {
            zone: None,
            lb_type: None,
            ip: None,
            allowed_ranges: vec!["192.0.2.0/24".to_string()],
        };
        let (mut scope, client) = scope_with(Some(lb_spec), false);

        reconcile(&mut scope).await.unwrap();
        let log = client.mutation_log();
        assert!(log.contains(&"create_acl allowed-ranges".to_string()));
        assert!(log.contains(&"create_acl deny-all".to_string()));
        // No gateway, so no gateway ACL.
        assert!(!log.iter().any(|l| l.contains("public-gateway")));

        client.clear_mutation_log();
        reconcile(&mut scope).await.unwrap();
        assert!(client.mutation_log().is_empty());

        // Editing the ranges updates the existing ACL in place.
        scope
            .cluster
            .spec
            .control_plane_load_balancer
            .as_mut()
            .unwrap()
            .allowed_ranges = vec!["198.51.100.0/24".to_string()];
        client.clear_mutation_log();
        reconcile(&mut scope).await.unwrap();
        assert_eq!(client.mutation_log(), vec!["update_acl allowed-ranges"]);

        // Opening the cluster back up removes the ACLs.
        scope
            .cluster
            .spec
            .control_plane_load_balancer
            .as_mut()
            .unwrap()
            .allowed_ranges
            .clear();
        client.clear_mutation_log();
        reconcile(&mut scope).await.unwrap();
        let log = client.mutation_log();
        assert_eq!(log.iter().filter(|l| l.starts_with("delete_acl")).count(), 2);
    }

    #[tokio::test]
    async fn gateway_egress_is_allowed_when_restricted() {
        let lb_spec = crds::LoadBalancerSpec {
            zone: None,
            lb_type: None,
            ip: None,
            allowed_ranges: vec!["192.0.2.0/24".to_string()],
        };
        let (mut scope, client) = scope_with(Some(lb_spec), true);
        scope.set_private_network_id("pn-1".to_string());
        // Gateway created by its own service beforehand.
        crate::service::public_gateway::reconcile(&mut scope)
            .await
            .unwrap();

        client.clear_mutation_log();
        reconcile(&mut scope).await.unwrap();
        let log = client.mutation_log();
        assert!(log.contains(&"create_acl public-gateway".to_string()));
        assert!(log.iter().any(|l| l.starts_with("attach_lb_private_network")));
    }

    #[tokio::test]
    async fn gateway_acl_is_kept_without_allowed_ranges() {
        let (mut scope, client) = scope_with(None, true);
        scope.set_private_network_id("pn-1".to_string());
        crate::service::public_gateway::reconcile(&mut scope)
            .await
            .unwrap();

        client.clear_mutation_log();
        reconcile(&mut scope).await.unwrap();

        // The gateway slot is created up front so restricting the ranges
        // later never cuts the nodes off from the API server.
        let log = client.mutation_log();
        assert!(log.contains(&"create_acl public-gateway".to_string()));
        assert!(!log.iter().any(|l| l.contains("allowed-ranges")));
        assert!(!log.iter().any(|l| l.contains("deny-all")));
    }

    #[tokio::test]
    async fn prunes_out_of_band_backends_and_frontends() {
        let (mut scope, client) = scope_with(None, false);
        reconcile(&mut scope).await.unwrap();

        let zone = Zone::from("fr-par-1");
        let stray_backend = scope
            .client
            .create_backend(
                &zone,
                "lb-2",
                "ssh",
                22,
                &HealthCheck {
                    port: 22,
                    check_max_retries: 3,
                },
            )
            .await
            .unwrap();
        let stray_frontend = scope
            .client
            .create_frontend(&zone, "lb-2", "ssh", 22, &stray_backend.id)
            .await
            .unwrap();

        client.clear_mutation_log();
        reconcile(&mut scope).await.unwrap();
        assert_eq!(
            client.mutation_log(),
            vec![
                format!("delete_frontend {}", stray_frontend.id),
                format!("delete_backend {}", stray_backend.id),
            ]
        );
    }

    #[tokio::test]
    async fn delete_keeps_pinned_ip() {
        let zone = Zone::from("fr-par-1");
        let lb_spec = crds::LoadBalancerSpec {
            zone: None,
            lb_type: None,
            ip: Some("51.159.0.10".to_string()),
            allowed_ranges: vec![],
        };
        let (mut scope, client) = scope_with(Some(lb_spec), false);
        client.seed_lb_ip(
            &zone,
            LbIp {
                id: "lbip-pinned".to_string(),
                ip_address: "51.159.0.10".to_string(),
            },
        );
        reconcile(&mut scope).await.unwrap();

        client.clear_mutation_log();
        delete(&scope).await.unwrap();
        assert_eq!(
            client.mutation_log(),
            vec!["delete_lb lb-1 release_ip=false"]
        );
    }
}
