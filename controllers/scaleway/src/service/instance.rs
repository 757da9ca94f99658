//! Compute instance reconciliation.
//!
//! Brings a machine from nothing to a running, bootstrapped node:
//! resolve the image, reserve a tagged public IP when requested, create the
//! server, join the private network, wait for a DHCP address, register
//! control-plane machines in the load balancer, inject the rendered
//! bootstrap payload while the server is stopped, then power it on.
//!
//! Deletion walks the same resources backwards and drives the server through
//! a stop-then-delete state machine, requeuing while a transition is in
//! flight.

use crate::error::{ControllerError, NotReadyReason};
use crate::scope::MachineScope;
use crate::service::loadbalancer::{ACL_MACHINE_INDEX, CONTROL_PLANE_NAME};
use crds::{MachineAddress, MachineAddressType};
use scaleway_client::{
    AclActionType, Backend, CreateServerRequest, ScalewayError, Server, ServerAction, ServerState,
    Zone,
};
use tracing::info;
use uuid::Uuid;

/// User data key read by cloud-init at first boot.
const USER_DATA_KEY: &str = "cloud-init";

/// Slot of the root volume on a server.
const BOOT_VOLUME_SLOT: &str = "0";

pub async fn reconcile(scope: &mut MachineScope) -> Result<(), ControllerError> {
    let zone = scope.zone();
    let server = ensure_server(scope, &zone).await?;

    let private_ip = ensure_private_network(scope, &zone, &server).await?;
    let provider_id = scope.provider_id(&zone, &server.id);

    if scope.is_control_plane() {
        // Backend pool entry: internal address when the cluster has a
        // private network, public address otherwise.
        let node_ip = private_ip
            .as_deref()
            .or(server.public_ip.as_ref().map(|ip| ip.address.as_str()))
            .ok_or(ControllerError::NotReady(NotReadyReason::PrivateIp))?;
        register_control_plane(scope, node_ip, server.public_ip.as_ref().map(|ip| ip.address.clone()))
            .await?;
    }

    if server.state == ServerState::Stopped {
        // A server stopped by hand after first boot already carries its
        // payload, only inject once.
        let injected = scope
            .client()
            .list_server_user_data(&zone, &server.id)
            .await?
            .iter()
            .any(|key| key == USER_DATA_KEY);
        if !injected {
            let node_ip = private_ip
                .as_deref()
                .or(server.public_ip.as_ref().map(|ip| ip.address.as_str()))
                .ok_or(ControllerError::NotReady(NotReadyReason::PrivateIp))?;
            let payload = scope.render_bootstrap_data(node_ip, &provider_id)?;
            info!(machine = scope.name(), server = %server.id, "Injecting bootstrap payload");
            scope
                .client()
                .set_server_user_data(&zone, &server.id, USER_DATA_KEY, &payload)
                .await?;
        }
        info!(machine = scope.name(), server = %server.id, "Powering on");
        scope
            .client()
            .server_action(&zone, &server.id, ServerAction::Poweron)
            .await?;
    }

    let mut addresses = Vec::new();
    if let Some(public_ip) = &server.public_ip {
        addresses.push(MachineAddress {
            address_type: MachineAddressType::ExternalIP,
            address: public_ip.address.clone(),
        });
    }
    if let Some(private_ip) = &private_ip {
        addresses.push(MachineAddress {
            address_type: MachineAddressType::InternalIP,
            address: private_ip.clone(),
        });
    }
    if addresses.is_empty() {
        return Err(ControllerError::InvalidConfig(format!(
            "server {} has neither a public IP nor a private network address",
            server.id
        )));
    }
    scope.status.addresses = addresses;
    scope.status.ready = true;

    // The provider ID is written once and never changed afterwards.
    if scope.machine.spec.provider_id.is_none() {
        scope.machine.spec.provider_id = Some(provider_id);
    }
    Ok(())
}

async fn ensure_server(scope: &MachineScope, zone: &Zone) -> Result<Server, ControllerError> {
    let name = scope.resource_name();
    match scope.client().find_server_by_name(zone, &name).await {
        Ok(server) => Ok(server),
        Err(ScalewayError::NoItemFound) => {
            let spec = &scope.machine.spec;
            let image = resolve_image(scope, zone).await?;
            let public_ip_id = if spec.public_ip.unwrap_or(false) {
                Some(ensure_public_ip(scope, zone).await?)
            } else {
                None
            };
            let security_group_id = match &spec.security_group_name {
                Some(short_name) => {
                    let sg_name = scope.cluster.security_group_name(short_name);
                    Some(
                        scope
                            .client()
                            .find_security_group_by_name(zone, &sg_name)
                            .await?
                            .id,
                    )
                }
                None => None,
            };
            info!(machine = scope.name(), %zone, "Creating server");
            Ok(scope
                .client()
                .create_server(
                    zone,
                    &CreateServerRequest {
                        name,
                        commercial_type: spec.commercial_type.clone(),
                        image,
                        tags: scope.tags(),
                        security_group_id,
                        public_ip_id,
                        root_volume_size_gb: scope.root_volume_size_gb(),
                        root_volume_type: scope.root_volume_type(),
                    },
                )
                .await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// The image field holds either a raw image UUID or a marketplace label.
async fn resolve_image(scope: &MachineScope, zone: &Zone) -> Result<String, ControllerError> {
    let image = &scope.machine.spec.image;
    if Uuid::parse_str(image).is_ok() {
        return Ok(image.clone());
    }
    scope
        .client()
        .get_local_image_id_by_label(zone, &scope.machine.spec.commercial_type, image)
        .await
        .map_err(|e| match e {
            ScalewayError::NoItemFound => ControllerError::InvalidConfig(format!(
                "no image with label {} for commercial type {}",
                image, scope.machine.spec.commercial_type
            )),
            e => e.into(),
        })
}

/// Reserve (or find back, by exact tag set) the machine's flexible public IP.
async fn ensure_public_ip(scope: &MachineScope, zone: &Zone) -> Result<String, ControllerError> {
    let tags = scope.tags();
    match scope.client().find_instance_ip_by_tags(zone, &tags).await {
        Ok(ip) => Ok(ip.id),
        Err(ScalewayError::NoItemFound) => {
            info!(machine = scope.name(), "Reserving public IP");
            Ok(scope.client().create_instance_ip(zone, &tags).await?.id)
        }
        Err(e) => Err(e.into()),
    }
}

/// Join the private network and resolve the machine's IPv4 on it.
///
/// Returns `None` when the cluster has no private network. Fails with a
/// transient not-ready condition while DHCP has not assigned an address.
async fn ensure_private_network(
    scope: &MachineScope,
    zone: &Zone,
    server: &Server,
) -> Result<Option<String>, ControllerError> {
    if !scope.cluster.has_private_network() {
        return Ok(None);
    }
    let private_network_id = scope
        .cluster
        .private_network_id()
        .ok_or(ControllerError::NotReady(NotReadyReason::OwnerClusterNotReady))?;

    let nic = match scope
        .client()
        .find_private_nic(zone, &server.id, &private_network_id)
        .await
    {
        Ok(nic) => nic,
        Err(ScalewayError::NoItemFound) => {
            info!(machine = scope.name(), server = %server.id, "Joining private network");
            scope
                .client()
                .create_private_nic(zone, &server.id, &private_network_id)
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    match scope
        .client()
        .find_ipv4_by_private_nic_id(&scope.cluster.region(), &nic.id)
        .await
    {
        Ok(address) => Ok(Some(address)),
        Err(ScalewayError::NoItemFound) => {
            Err(ControllerError::NotReady(NotReadyReason::PrivateIp))
        }
        Err(e) => Err(e.into()),
    }
}

/// Register a control-plane machine in the load balancer: private IP in the
/// backend pool, public IP allowed by a per-machine ACL.
async fn register_control_plane(
    scope: &MachineScope,
    node_ip: &str,
    public_ip: Option<String>,
) -> Result<(), ControllerError> {
    let lb_zone = scope.cluster.load_balancer_zone();
    let (backend, frontend_id) = control_plane_lb(scope, &lb_zone).await?;

    if !backend.pool.contains(&node_ip.to_string()) {
        info!(machine = scope.name(), %node_ip, "Adding to control-plane backend pool");
        scope
            .client()
            .add_backend_servers(&lb_zone, &backend.id, &[node_ip.to_string()])
            .await?;
    }

    // The per-machine ACL allows the node's public IP through the frontend.
    // A machine without a public IP gets no slot, and a stale slot left by a
    // released IP is removed so a recycled address stays locked out.
    let acl_name = scope.resource_name();
    let subnets = match public_ip {
        Some(public_ip) => vec![format!("{public_ip}/32")],
        None => vec![],
    };
    let existing = match scope
        .client()
        .find_acl_by_name(&lb_zone, &frontend_id, &acl_name)
        .await
    {
        Ok(acl) => Some(acl),
        Err(ScalewayError::NoItemFound) => None,
        Err(e) => return Err(e.into()),
    };
    match (existing, subnets.is_empty()) {
        (Some(acl), true) => {
            info!(machine = scope.name(), "Removing node ACL from load balancer");
            scope.client().delete_acl(&lb_zone, &acl.id).await?;
        }
        (Some(acl), false) => {
            let current = acl
                .acl_match
                .as_ref()
                .map(|m| m.ip_subnet.clone())
                .unwrap_or_default();
            if current != subnets || acl.index != ACL_MACHINE_INDEX {
                scope
                    .client()
                    .update_acl(
                        &lb_zone,
                        &acl.id,
                        &acl_name,
                        ACL_MACHINE_INDEX,
                        AclActionType::Allow,
                        &subnets,
                    )
                    .await?;
            }
        }
        (None, false) => {
            info!(machine = scope.name(), "Allowing node public IP on load balancer");
            scope
                .client()
                .create_acl(
                    &lb_zone,
                    &frontend_id,
                    &acl_name,
                    ACL_MACHINE_INDEX,
                    AclActionType::Allow,
                    &subnets,
                )
                .await?;
        }
        (None, true) => {}
    }
    Ok(())
}

async fn control_plane_lb(
    scope: &MachineScope,
    lb_zone: &Zone,
) -> Result<(Backend, String), ControllerError> {
    let lb = scope
        .client()
        .find_lb_by_name(lb_zone, &scope.cluster.resource_name())
        .await
        .map_err(|e| match e {
            ScalewayError::NoItemFound => {
                ControllerError::NotReady(NotReadyReason::OwnerClusterNotReady)
            }
            e => e.into(),
        })?;
    let backend = scope
        .client()
        .find_backend_by_name(lb_zone, &lb.id, CONTROL_PLANE_NAME)
        .await
        .map_err(|e| match e {
            ScalewayError::NoItemFound => {
                ControllerError::NotReady(NotReadyReason::OwnerClusterNotReady)
            }
            e => e.into(),
        })?;
    let frontend = scope
        .client()
        .find_frontend_by_name(lb_zone, &lb.id, CONTROL_PLANE_NAME)
        .await
        .map_err(|e| match e {
            ScalewayError::NoItemFound => {
                ControllerError::NotReady(NotReadyReason::OwnerClusterNotReady)
            }
            e => e.into(),
        })?;
    Ok((backend, frontend.id))
}

/// Tear the machine down.
///
/// The server must be stopped before it can be deleted: a running server is
/// powered off and the deletion requeued until the stop completes. A locked
/// server cannot be recovered automatically.
pub async fn delete(scope: &MachineScope) -> Result<(), ControllerError> {
    let zone = scope.zone();
    let server = match scope
        .client()
        .find_server_by_name(&zone, &scope.resource_name())
        .await
    {
        Ok(server) => server,
        Err(ScalewayError::NoItemFound) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    retract_load_balancer(scope, &zone, &server).await?;

    // Flexible IPs survive server deletion and would leak.
    if let Some(public_ip) = &server.public_ip {
        if !public_ip.dynamic {
            info!(machine = scope.name(), "Releasing public IP");
            scope.client().delete_instance_ip(&zone, &public_ip.id).await?;
        }
    }

    match server.state {
        // A stopped-in-place server still holds its hypervisor slot and
        // must be fully powered off before deletion.
        ServerState::Running | ServerState::Starting | ServerState::StoppedInPlace => {
            info!(machine = scope.name(), server = %server.id, "Powering off");
            scope
                .client()
                .server_action(&zone, &server.id, ServerAction::Poweroff)
                .await?;
            return Err(ControllerError::NotReady(NotReadyReason::InstanceNotStopped));
        }
        ServerState::Stopping => {
            return Err(ControllerError::NotReady(NotReadyReason::InstanceNotStopped));
        }
        ServerState::Locked => {
            return Err(ControllerError::InstanceLocked(server.id.clone()));
        }
        ServerState::Stopped => {}
    }

    // The boot volume is not deleted with the server, detach and delete it
    // explicitly.
    if let Some(volume) = server.volumes.get(BOOT_VOLUME_SLOT) {
        if volume.boot {
            info!(machine = scope.name(), volume = %volume.id, "Deleting boot volume");
            scope
                .client()
                .detach_volume(&zone, &server.id, BOOT_VOLUME_SLOT)
                .await?;
            scope.client().delete_volume(&zone, &volume.id).await?;
        }
    }

    info!(machine = scope.name(), server = %server.id, "Deleting server");
    scope.client().delete_server(&zone, &server.id).await?;
    Ok(())
}

/// Undo any load balancer registration the machine may hold. Runs for
/// workers too: a machine that was a control plane before a spec edit must
/// still be retracted.
async fn retract_load_balancer(
    scope: &MachineScope,
    zone: &Zone,
    server: &Server,
) -> Result<(), ControllerError> {
    let lb_zone = scope.cluster.load_balancer_zone();
    let (backend, frontend_id) = match control_plane_lb(scope, &lb_zone).await {
        Ok(found) => found,
        // The cluster's load balancer is already gone.
        Err(ControllerError::NotReady(NotReadyReason::OwnerClusterNotReady)) => return Ok(()),
        Err(e) => return Err(e),
    };

    match scope
        .client()
        .find_acl_by_name(&lb_zone, &frontend_id, &scope.resource_name())
        .await
    {
        Ok(acl) => {
            info!(machine = scope.name(), "Retracting load balancer ACL");
            scope.client().delete_acl(&lb_zone, &acl.id).await?;
        }
        Err(ScalewayError::NoItemFound) => {}
        Err(e) => return Err(e.into()),
    }

    if let Some(private_ip) = private_ip_of(scope, zone, server).await? {
        if backend.pool.contains(&private_ip) {
            info!(machine = scope.name(), "Removing from control-plane backend pool");
            scope
                .client()
                .remove_backend_servers(&lb_zone, &backend.id, &[private_ip])
                .await?;
        }
    }
    Ok(())
}

async fn private_ip_of(
    scope: &MachineScope,
    zone: &Zone,
    server: &Server,
) -> Result<Option<String>, ControllerError> {
    let Some(private_network_id) = scope.cluster.private_network_id() else {
        return Ok(None);
    };
    let nic = match scope
        .client()
        .find_private_nic(zone, &server.id, &private_network_id)
        .await
    {
        Ok(nic) => nic,
        Err(ScalewayError::NoItemFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match scope
        .client()
        .find_ipv4_by_private_nic_id(&scope.cluster.region(), &nic.id)
        .await
    {
        Ok(address) => Ok(Some(address)),
        Err(ScalewayError::NoItemFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
