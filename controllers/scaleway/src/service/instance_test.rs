//! Unit tests for the compute instance service

use crate::error::{ControllerError, NotReadyReason};
use crate::scope::{ClusterScope, MachineScope};
use crate::service::{instance, loadbalancer, private_network};
use crds::MachineAddressType;
use kube::api::ObjectMeta;
use scaleway_client::{
    AclActionType, LocalImage, MockScalewayClient, PrivateNic, Server, ServerState, Zone,
};
use std::sync::Arc;

const ZONE: &str = "fr-par-1";

fn cluster_scope(client: Arc<MockScalewayClient>) -> ClusterScope {
    cluster_scope_with(client, true, vec!["192.0.2.0/24".to_string()])
}

fn cluster_scope_with(
    client: Arc<MockScalewayClient>,
    private_network: bool,
    allowed_ranges: Vec<String>,
) -> ClusterScope {
    let cluster = crds::ScalewayCluster {
        metadata: ObjectMeta {
            name: Some("demo".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: crds::ScalewayClusterSpec {
            control_plane_endpoint: None,
            failure_domains: Some(vec![ZONE.to_string()]),
            region: "fr-par".to_string(),
            network: private_network.then(|| crds::NetworkSpec {
                private_network: Some(crds::PrivateNetworkSpec {
                    enabled: true,
                    id: None,
                    subnet: None,
                }),
                public_gateway: None,
                security_groups: vec![],
            }),
            control_plane_load_balancer: Some(crds::LoadBalancerSpec {
                zone: None,
                lb_type: None,
                ip: None,
                allowed_ranges,
            }),
            scaleway_secret_name: "scaleway-secret".to_string(),
        },
        status: None,
    };
    ClusterScope::new(cluster, client)
}

fn machine(name: &str, control_plane: bool) -> crds::ScalewayMachine {
    crds::ScalewayMachine {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: crds::ScalewayMachineSpec {
            cluster_name: "demo".to_string(),
            provider_id: None,
            image: "ubuntu_jammy".to_string(),
            commercial_type: "PRO2-S".to_string(),
            root_volume_size: None,
            root_volume_type: None,
            public_ip: Some(true),
            security_group_name: None,
            control_plane: Some(control_plane),
            failure_domain: None,
            bootstrap_secret_name: Some("bootstrap".to_string()),
        },
        status: None,
    }
}

/// Converge the cluster side and return a machine scope on top of it.
async fn converged_machine_scope(
    client: &Arc<MockScalewayClient>,
    control_plane: bool,
) -> MachineScope {
    let scope = cluster_scope(client.clone());
    converged_machine_scope_on(client, scope, control_plane).await
}

async fn converged_machine_scope_on(
    client: &Arc<MockScalewayClient>,
    mut scope: ClusterScope,
    control_plane: bool,
) -> MachineScope {
    client.seed_local_image(
        &Zone::from(ZONE),
        "PRO2-S",
        LocalImage {
            id: "22222222-2222-2222-2222-222222222222".to_string(),
            label: Some("ubuntu_jammy".to_string()),
        },
    );
    if scope.has_private_network() {
        private_network::reconcile(&mut scope).await.unwrap();
    }
    loadbalancer::reconcile(&mut scope).await.unwrap();
    client.clear_mutation_log();
    MachineScope::new(
        machine("node-0", control_plane),
        scope,
        Some("ip=[[[ .NodeIP ]]] id=[[[ .ProviderID ]]]".to_string()),
    )
}

#[tokio::test]
async fn control_plane_machine_converges_then_stays_quiet() {
    let client = Arc::new(MockScalewayClient::new());
    let mut scope = converged_machine_scope(&client, true).await;

    instance::reconcile(&mut scope).await.unwrap();

    let log = client.mutation_log();
    assert!(log[0].starts_with("create_instance_ip"));
    assert_eq!(log[1], "create_server caps-node-0");
    assert!(log[2].starts_with("create_private_nic"));
    assert!(log[3].starts_with("add_backend_servers"));
    assert_eq!(log[4], "create_acl caps-node-0");
    assert!(log[5].starts_with("set_server_user_data"));
    assert!(log[6].contains("Poweron"));
    assert_eq!(log.len(), 7);

    // Addresses: external first, then the private network address.
    assert_eq!(scope.status.addresses.len(), 2);
    assert_eq!(
        scope.status.addresses[0].address_type,
        MachineAddressType::ExternalIP
    );
    assert_eq!(
        scope.status.addresses[1].address_type,
        MachineAddressType::InternalIP
    );
    assert!(scope.status.ready);

    let provider_id = scope.machine.spec.provider_id.clone().unwrap();
    assert!(provider_id.starts_with("scaleway://instance/fr-par-1/"));

    // The backend pool holds the private address.
    let internal = scope.status.addresses[1].address.clone();
    let pool = client.backend_pool("bk-4");
    assert_eq!(pool, vec![internal.clone()]);

    // The injected payload was rendered with the node's identity.
    let server_id = provider_id.rsplit('/').next().unwrap();
    let payload = client.user_data(server_id, "cloud-init").unwrap();
    assert_eq!(payload, format!("ip={internal} id={provider_id}"));

    // Second pass: everything is found, nothing is written.
    client.clear_mutation_log();
    instance::reconcile(&mut scope).await.unwrap();
    assert!(client.mutation_log().is_empty());
}

#[tokio::test]
async fn worker_machine_does_not_touch_the_load_balancer() {
    let client = Arc::new(MockScalewayClient::new());
    let mut scope = converged_machine_scope(&client, false).await;

    instance::reconcile(&mut scope).await.unwrap();

    let log = client.mutation_log();
    assert!(!log.iter().any(|l| l.contains("backend") || l.contains("acl")));
}

#[tokio::test]
async fn private_only_machine_reports_internal_address_only() {
    let client = Arc::new(MockScalewayClient::new());
    let mut scope = converged_machine_scope(&client, false).await;
    scope.machine.spec.public_ip = None;

    instance::reconcile(&mut scope).await.unwrap();
    assert_eq!(scope.status.addresses.len(), 1);
    assert_eq!(
        scope.status.addresses[0].address_type,
        MachineAddressType::InternalIP
    );
    assert!(scope.status.ready);
}

#[tokio::test]
async fn node_acl_exists_even_without_allowed_ranges() {
    let client = Arc::new(MockScalewayClient::new());
    let open_cluster = cluster_scope_with(client.clone(), true, vec![]);
    let mut scope = converged_machine_scope_on(&client, open_cluster, true).await;

    instance::reconcile(&mut scope).await.unwrap();

    // The per-machine allow slot is not tied to the allowed-ranges list.
    let log = client.mutation_log();
    assert!(log.iter().any(|l| l == "create_acl caps-node-0"));
}

#[tokio::test]
async fn stale_node_acl_is_removed_when_the_public_ip_goes_away() {
    let client = Arc::new(MockScalewayClient::new());
    let mut scope = converged_machine_scope(&client, true).await;
    scope.machine.spec.public_ip = None;

    // Slot left behind by a previous reconcile, when the machine still
    // held a public address.
    scope
        .client()
        .create_acl(
            &Zone::from(ZONE),
            "ft-5",
            "caps-node-0",
            loadbalancer::ACL_MACHINE_INDEX,
            AclActionType::Allow,
            &["198.51.100.7/32".to_string()],
        )
        .await
        .unwrap();
    client.clear_mutation_log();

    instance::reconcile(&mut scope).await.unwrap();

    let log = client.mutation_log();
    assert!(log.iter().any(|l| l.starts_with("delete_acl")));
    assert!(!log.iter().any(|l| l.starts_with("create_acl")));
}

#[tokio::test]
async fn control_plane_without_private_network_joins_the_pool_publicly() {
    let client = Arc::new(MockScalewayClient::new());
    let public_cluster = cluster_scope_with(client.clone(), false, vec!["192.0.2.0/24".to_string()]);
    let mut scope = converged_machine_scope_on(&client, public_cluster, true).await;

    instance::reconcile(&mut scope).await.unwrap();

    assert_eq!(scope.status.addresses.len(), 1);
    assert_eq!(
        scope.status.addresses[0].address_type,
        MachineAddressType::ExternalIP
    );
    // The backend pool falls back to the public address.
    let public = scope.status.addresses[0].address.clone();
    assert_eq!(client.backend_pool("bk-3"), vec![public]);
}

#[tokio::test]
async fn provider_id_is_never_rewritten() {
    let client = Arc::new(MockScalewayClient::new());
    let mut scope = converged_machine_scope(&client, true).await;
    scope.machine.spec.provider_id = Some("scaleway://instance/fr-par-1/preexisting".to_string());

    instance::reconcile(&mut scope).await.unwrap();
    assert_eq!(
        scope.machine.spec.provider_id.as_deref(),
        Some("scaleway://instance/fr-par-1/preexisting")
    );
}

#[tokio::test]
async fn missing_dhcp_address_is_a_transient_condition() {
    let client = Arc::new(MockScalewayClient::new());
    let mut scope = converged_machine_scope(&client, false).await;

    // A server that already joined the network but has no IPAM address yet.
    let zone = Zone::from(ZONE);
    client.seed_server(
        &zone,
        Server {
            id: "srv-cold".to_string(),
            name: "caps-node-0".to_string(),
            state: ServerState::Stopped,
            commercial_type: "PRO2-S".to_string(),
            tags: scope.tags(),
            public_ip: None,
            volumes: Default::default(),
        },
    );
    client.seed_private_nic(
        &zone,
        PrivateNic {
            id: "nic-cold".to_string(),
            server_id: "srv-cold".to_string(),
            private_network_id: scope.cluster.private_network_id().unwrap(),
        },
    );

    let err = instance::reconcile(&mut scope).await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::NotReady(NotReadyReason::PrivateIp)
    ));
}

#[tokio::test]
async fn unknown_image_label_is_a_configuration_error() {
    let client = Arc::new(MockScalewayClient::new());
    let mut scope = converged_machine_scope(&client, false).await;
    scope.machine.spec.image = "no_such_label".to_string();

    let err = instance::reconcile(&mut scope).await.unwrap_err();
    assert!(matches!(err, ControllerError::InvalidConfig(_)));
}

#[tokio::test]
async fn uuid_image_skips_the_marketplace() {
    let client = Arc::new(MockScalewayClient::new());
    let mut scope = converged_machine_scope(&client, false).await;
    // No marketplace entry exists for this UUID, creation must still work.
    scope.machine.spec.image = "33333333-3333-3333-3333-333333333333".to_string();

    instance::reconcile(&mut scope).await.unwrap();
    let created = client
        .server(
            scope
                .machine
                .spec
                .provider_id
                .as_deref()
                .unwrap()
                .rsplit('/')
                .next()
                .unwrap(),
        )
        .unwrap();
    assert_eq!(created.name, "caps-node-0");
}

#[tokio::test]
async fn delete_walks_the_stop_then_delete_state_machine() {
    let client = Arc::new(MockScalewayClient::new());
    let mut scope = converged_machine_scope(&client, true).await;
    instance::reconcile(&mut scope).await.unwrap();
    let server_id = scope
        .machine
        .spec
        .provider_id
        .clone()
        .unwrap()
        .rsplit('/')
        .next()
        .unwrap()
        .to_string();

    // First pass: the running server is powered off and deletion requeued.
    client.clear_mutation_log();
    let err = instance::delete(&scope).await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::NotReady(NotReadyReason::InstanceNotStopped)
    ));
    let log = client.mutation_log();
    assert!(log.iter().any(|l| l.starts_with("delete_acl")));
    assert!(log.iter().any(|l| l.starts_with("remove_backend_servers")));
    assert!(log.iter().any(|l| l.starts_with("delete_instance_ip")));
    assert!(log.iter().any(|l| l.contains("Poweroff")));
    assert!(!log.iter().any(|l| l.starts_with("delete_server")));

    // Second pass: the server stopped in the meantime, teardown completes.
    client.clear_mutation_log();
    instance::delete(&scope).await.unwrap();
    let log = client.mutation_log();
    assert!(log.iter().any(|l| l.starts_with("detach_volume")));
    assert!(log.iter().any(|l| l.starts_with("delete_volume")));
    assert_eq!(log.last().unwrap(), &format!("delete_server {server_id}"));
    assert!(client.server(&server_id).is_none());

    // Third pass: nothing left to do.
    client.clear_mutation_log();
    instance::delete(&scope).await.unwrap();
    assert!(client.mutation_log().is_empty());
}

#[tokio::test]
async fn stopped_in_place_server_is_powered_off_before_deletion() {
    let client = Arc::new(MockScalewayClient::new());
    let mut scope = converged_machine_scope(&client, false).await;
    instance::reconcile(&mut scope).await.unwrap();
    let server_id = scope
        .machine
        .spec
        .provider_id
        .clone()
        .unwrap()
        .rsplit('/')
        .next()
        .unwrap()
        .to_string();
    client.set_server_state(&server_id, ServerState::StoppedInPlace);

    // Stopped-in-place still occupies the hypervisor, deletion must wait
    // for a full power-off like a running server.
    client.clear_mutation_log();
    let err = instance::delete(&scope).await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::NotReady(NotReadyReason::InstanceNotStopped)
    ));
    let log = client.mutation_log();
    assert!(log.iter().any(|l| l.contains("Poweroff")));
    assert!(!log.iter().any(|l| l.starts_with("delete_server")));

    instance::delete(&scope).await.unwrap();
    assert!(client.server(&server_id).is_none());
}

#[tokio::test]
async fn locked_server_cannot_be_deleted() {
    let client = Arc::new(MockScalewayClient::new());
    let mut scope = converged_machine_scope(&client, false).await;
    instance::reconcile(&mut scope).await.unwrap();
    let server_id = scope
        .machine
        .spec
        .provider_id
        .clone()
        .unwrap()
        .rsplit('/')
        .next()
        .unwrap()
        .to_string();
    client.set_server_state(&server_id, ServerState::Locked);

    let err = instance::delete(&scope).await.unwrap_err();
    assert!(matches!(err, ControllerError::InstanceLocked(_)));
}
