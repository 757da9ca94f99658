//! Mock Scaleway client for unit tests
//!
//! `MockScalewayClient` keeps all resources in memory and records every
//! mutating call in an ordered log. Reconciliation tests assert idempotence
//! by checking that a second pass leaves the log untouched, and ordering by
//! inspecting the log sequence.
//!
//! Filtering mirrors the provider: name filters match substrings, tag
//! filters match supersets. Exact matching stays in the `find_*` trait
//! helpers so mocks exercise the same code path as the HTTP client.

use crate::error::ScalewayError;
use crate::models::*;
use crate::scaleway_trait::ScalewayClientTrait;
use crate::types::{Region, Zone};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    next_id: u64,
    mutations: Vec<String>,

    // Resources paired with the region/zone they live in.
    private_networks: Vec<(String, PrivateNetwork)>,
    gateways: Vec<(String, Gateway)>,
    gateway_ips: Vec<(String, GatewayIp)>,
    gateway_networks: Vec<(String, GatewayNetwork)>,
    lbs: Vec<(String, Lb)>,
    lb_ips: Vec<(String, LbIp)>,
    backends: Vec<(String, String, Backend)>,
    frontends: Vec<(String, String, Frontend)>,
    acls: Vec<(String, String, Acl)>,
    lb_private_networks: Vec<(String, String, LbPrivateNetwork)>,
    servers: Vec<(String, Server)>,
    user_data: HashMap<(String, String), String>,
    instance_ips: Vec<(String, InstanceIp)>,
    private_nics: Vec<(String, PrivateNic)>,
    security_groups: Vec<(String, SecurityGroup)>,
    security_group_rules: HashMap<String, Vec<SecurityGroupRule>>,
    local_images: Vec<(String, String, LocalImage)>,
    ipam_ips: HashMap<String, Vec<IpamIp>>,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn log(&mut self, entry: impl Into<String>) {
        self.mutations.push(entry.into());
    }
}

fn has_tags(resource_tags: &[String], wanted: &[String]) -> bool {
    wanted.iter().all(|t| resource_tags.contains(t))
}

fn name_matches(resource_name: &str, filter: Option<&str>) -> bool {
    filter.is_none_or(|f| resource_name.contains(f))
}

/// In-memory Scaleway client for tests
pub struct MockScalewayClient {
    project_id: String,
    state: Mutex<MockState>,
}

impl Default for MockScalewayClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScalewayClient {
    pub fn new() -> Self {
        Self {
            project_id: "11111111-1111-1111-1111-111111111111".to_string(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// All mutating calls made so far, in order.
    pub fn mutation_log(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    /// Clear the mutation log, usually between reconciliation passes.
    pub fn clear_mutation_log(&self) {
        self.state.lock().unwrap().mutations.clear();
    }

    // Seeding helpers for tests.

    pub fn seed_private_network(&self, region: &Region, pn: PrivateNetwork) {
        self.state
            .lock()
            .unwrap()
            .private_networks
            .push((region.to_string(), pn));
    }

    pub fn seed_lb(&self, zone: &Zone, lb: Lb) {
        self.state.lock().unwrap().lbs.push((zone.to_string(), lb));
    }

    pub fn seed_lb_ip(&self, zone: &Zone, ip: LbIp) {
        self.state.lock().unwrap().lb_ips.push((zone.to_string(), ip));
    }

    pub fn seed_gateway_ip(&self, zone: &Zone, ip: GatewayIp) {
        self.state.lock().unwrap().gateway_ips.push((zone.to_string(), ip));
    }

    pub fn seed_instance_ip(&self, zone: &Zone, ip: InstanceIp) {
        self.state.lock().unwrap().instance_ips.push((zone.to_string(), ip));
    }

    pub fn seed_server(&self, zone: &Zone, server: Server) {
        self.state.lock().unwrap().servers.push((zone.to_string(), server));
    }

    pub fn seed_private_nic(&self, zone: &Zone, nic: PrivateNic) {
        self.state.lock().unwrap().private_nics.push((zone.to_string(), nic));
    }

    pub fn seed_local_image(&self, zone: &Zone, commercial_type: &str, image: LocalImage) {
        self.state
            .lock()
            .unwrap()
            .local_images
            .push((zone.to_string(), commercial_type.to_string(), image));
    }

    pub fn seed_ipam_ip(&self, resource_id: &str, ip: IpamIp) {
        self.state
            .lock()
            .unwrap()
            .ipam_ips
            .entry(resource_id.to_string())
            .or_default()
            .push(ip);
    }

    /// Force a server into a lifecycle state.
    pub fn set_server_state(&self, server_id: &str, state: ServerState) {
        let mut guard = self.state.lock().unwrap();
        for (_, server) in &mut guard.servers {
            if server.id == server_id {
                server.state = state;
            }
        }
    }

    /// Force a load balancer into a provisioning status.
    pub fn set_lb_status(&self, lb_id: &str, status: LbStatus) {
        let mut guard = self.state.lock().unwrap();
        for (_, lb) in &mut guard.lbs {
            if lb.id == lb_id {
                lb.status = status;
            }
        }
    }

    /// Current rules of a security group, for assertions.
    pub fn security_group_rules(&self, security_group_id: &str) -> Vec<SecurityGroupRule> {
        self.state
            .lock()
            .unwrap()
            .security_group_rules
            .get(security_group_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Current pool of a backend, for assertions.
    pub fn backend_pool(&self, backend_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .backends
            .iter()
            .find(|(_, _, b)| b.id == backend_id)
            .map(|(_, _, b)| b.pool.clone())
            .unwrap_or_default()
    }

    /// Look a server up by ID, for assertions.
    pub fn server(&self, server_id: &str) -> Option<Server> {
        self.state
            .lock()
            .unwrap()
            .servers
            .iter()
            .find(|(_, s)| s.id == server_id)
            .map(|(_, s)| s.clone())
    }

    /// User data content set on a server key, for assertions.
    pub fn user_data(&self, server_id: &str, key: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .user_data
            .get(&(server_id.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait::async_trait]
impl ScalewayClientTrait for MockScalewayClient {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    // VPC operations
    async fn list_private_networks(&self, region: &Region, name: Option<&str>) -> Result<Vec<PrivateNetwork>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .private_networks
            .iter()
            .filter(|(r, pn)| r == &region.to_string() && name_matches(&pn.name, name))
            .map(|(_, pn)| pn.clone())
            .collect())
    }

    async fn create_private_network(&self, region: &Region, name: &str, subnets: &[String], tags: &[String]) -> Result<PrivateNetwork, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let id = guard.next_id("pn");
        let pn = PrivateNetwork {
            id: id.clone(),
            name: name.to_string(),
            dhcp_enabled: true,
            subnets: subnets
                .iter()
                .enumerate()
                .map(|(i, subnet)| Subnet {
                    id: format!("{id}-subnet-{i}"),
                    subnet: subnet.clone(),
                })
                .collect(),
            tags: tags.to_vec(),
        };
        guard.log(format!("create_private_network {name}"));
        guard.private_networks.push((region.to_string(), pn.clone()));
        Ok(pn)
    }

    async fn get_private_network(&self, region: &Region, id: &str) -> Result<PrivateNetwork, ScalewayError> {
        let guard = self.state.lock().unwrap();
        guard
            .private_networks
            .iter()
            .find(|(r, pn)| r == &region.to_string() && pn.id == id)
            .map(|(_, pn)| pn.clone())
            .ok_or(ScalewayError::Api {
                status: 404,
                message: format!("private network {id} not found"),
            })
    }

    async fn delete_private_network(&self, region: &Region, id: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let attached = guard.gateway_networks.iter().any(|(_, gn)| gn.private_network_id == id)
            || guard.private_nics.iter().any(|(_, nic)| nic.private_network_id == id)
            || guard.lb_private_networks.iter().any(|(_, _, pn)| pn.private_network_id == id);
        if attached {
            return Err(ScalewayError::Precondition(format!(
                "private network {id} still has attached resources"
            )));
        }
        guard.log(format!("delete_private_network {id}"));
        guard
            .private_networks
            .retain(|(r, pn)| !(r == &region.to_string() && pn.id == id));
        Ok(())
    }

    // Public gateway operations
    async fn list_gateways(&self, zone: &Zone, name: Option<&str>) -> Result<Vec<Gateway>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .gateways
            .iter()
            .filter(|(z, gw)| z == &zone.to_string() && name_matches(&gw.name, name))
            .map(|(_, gw)| gw.clone())
            .collect())
    }

    async fn create_gateway(&self, zone: &Zone, name: &str, gateway_type: &str, ip_id: Option<&str>, tags: &[String]) -> Result<Gateway, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let ip = match ip_id {
            Some(ip_id) => guard
                .gateway_ips
                .iter()
                .find(|(_, ip)| ip.id == ip_id)
                .map(|(_, ip)| ip.clone())
                .ok_or(ScalewayError::Api {
                    status: 404,
                    message: format!("gateway ip {ip_id} not found"),
                })?,
            None => {
                let id = guard.next_id("gwip");
                let ip = GatewayIp {
                    id: id.clone(),
                    address: format!("51.15.0.{}", guard.next_id),
                    tags: vec![],
                };
                guard.gateway_ips.push((zone.to_string(), ip.clone()));
                ip
            }
        };
        let id = guard.next_id("gw");
        let gw = Gateway {
            id,
            name: name.to_string(),
            gateway_type: Some(gateway_type.to_string()),
            ip: Some(ip),
        };
        let _ = tags;
        guard.log(format!("create_gateway {name}"));
        guard.gateways.push((zone.to_string(), gw.clone()));
        Ok(gw)
    }

    async fn delete_gateway(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("delete_gateway {id}"));
        guard.gateways.retain(|(z, gw)| !(z == &zone.to_string() && gw.id == id));
        guard.gateway_networks.retain(|(z, gn)| !(z == &zone.to_string() && gn.gateway_id == id));
        Ok(())
    }

    async fn list_gateway_ips(&self, zone: &Zone, tags: &[String]) -> Result<Vec<GatewayIp>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .gateway_ips
            .iter()
            .filter(|(z, ip)| z == &zone.to_string() && has_tags(&ip.tags, tags))
            .map(|(_, ip)| ip.clone())
            .collect())
    }

    async fn create_gateway_ip(&self, zone: &Zone, tags: &[String]) -> Result<GatewayIp, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let id = guard.next_id("gwip");
        let ip = GatewayIp {
            id: id.clone(),
            address: format!("51.15.0.{}", guard.next_id),
            tags: tags.to_vec(),
        };
        guard.log(format!("create_gateway_ip {id}"));
        guard.gateway_ips.push((zone.to_string(), ip.clone()));
        Ok(ip)
    }

    async fn delete_gateway_ip(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("delete_gateway_ip {id}"));
        guard.gateway_ips.retain(|(z, ip)| !(z == &zone.to_string() && ip.id == id));
        Ok(())
    }

    async fn list_gateway_networks(&self, zone: &Zone, gateway_id: Option<&str>, private_network_id: Option<&str>) -> Result<Vec<GatewayNetwork>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .gateway_networks
            .iter()
            .filter(|(z, gn)| {
                z == &zone.to_string()
                    && gateway_id.is_none_or(|id| gn.gateway_id == id)
                    && private_network_id.is_none_or(|id| gn.private_network_id == id)
            })
            .map(|(_, gn)| gn.clone())
            .collect())
    }

    async fn create_gateway_network(&self, zone: &Zone, gateway_id: &str, private_network_id: &str, enable_dhcp: bool, enable_masquerade: bool, push_default_route: bool) -> Result<GatewayNetwork, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let id = guard.next_id("gwnet");
        let gn = GatewayNetwork {
            id,
            gateway_id: gateway_id.to_string(),
            private_network_id: private_network_id.to_string(),
        };
        let _ = (enable_dhcp, enable_masquerade, push_default_route);
        guard.log(format!("create_gateway_network {gateway_id} {private_network_id}"));
        guard.gateway_networks.push((zone.to_string(), gn.clone()));
        Ok(gn)
    }

    async fn delete_gateway_network(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("delete_gateway_network {id}"));
        guard
            .gateway_networks
            .retain(|(z, gn)| !(z == &zone.to_string() && gn.id == id));
        Ok(())
    }

    // Load balancer operations
    async fn list_lbs(&self, zone: &Zone, name: Option<&str>) -> Result<Vec<Lb>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .lbs
            .iter()
            .filter(|(z, lb)| z == &zone.to_string() && name_matches(&lb.name, name))
            .map(|(_, lb)| lb.clone())
            .collect())
    }

    async fn create_lb(&self, zone: &Zone, name: &str, lb_type: &str, ip_id: Option<&str>, tags: &[String]) -> Result<Lb, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let ip = match ip_id {
            Some(ip_id) => guard
                .lb_ips
                .iter()
                .find(|(_, ip)| ip.id == ip_id)
                .map(|(_, ip)| ip.clone())
                .ok_or(ScalewayError::Api {
                    status: 404,
                    message: format!("lb ip {ip_id} not found"),
                })?,
            None => {
                let id = guard.next_id("lbip");
                let ip = LbIp {
                    id: id.clone(),
                    ip_address: format!("51.159.0.{}", guard.next_id),
                };
                guard.lb_ips.push((zone.to_string(), ip.clone()));
                ip
            }
        };
        let id = guard.next_id("lb");
        let lb = Lb {
            id,
            name: name.to_string(),
            status: LbStatus::Ready,
            lb_type: Some(lb_type.to_string()),
            ip: vec![ip],
            tags: tags.to_vec(),
        };
        guard.log(format!("create_lb {name}"));
        guard.lbs.push((zone.to_string(), lb.clone()));
        Ok(lb)
    }

    async fn delete_lb(&self, zone: &Zone, id: &str, release_ip: bool) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("delete_lb {id} release_ip={release_ip}"));
        if release_ip {
            let owned: Vec<String> = guard
                .lbs
                .iter()
                .filter(|(z, lb)| z == &zone.to_string() && lb.id == id)
                .flat_map(|(_, lb)| lb.ip.iter().map(|ip| ip.id.clone()))
                .collect();
            guard.lb_ips.retain(|(_, ip)| !owned.contains(&ip.id));
        }
        guard.lbs.retain(|(z, lb)| !(z == &zone.to_string() && lb.id == id));
        guard.backends.retain(|(z, lb_id, _)| !(z == &zone.to_string() && lb_id == id));
        guard.frontends.retain(|(z, lb_id, _)| !(z == &zone.to_string() && lb_id == id));
        guard.lb_private_networks.retain(|(z, lb_id, _)| !(z == &zone.to_string() && lb_id == id));
        Ok(())
    }

    async fn list_lb_ips(&self, zone: &Zone, ip_address: Option<&str>) -> Result<Vec<LbIp>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .lb_ips
            .iter()
            .filter(|(z, ip)| z == &zone.to_string() && ip_address.is_none_or(|a| ip.ip_address == a))
            .map(|(_, ip)| ip.clone())
            .collect())
    }

    async fn list_backends(&self, zone: &Zone, lb_id: &str, name: Option<&str>) -> Result<Vec<Backend>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .backends
            .iter()
            .filter(|(z, l, b)| z == &zone.to_string() && l == lb_id && name_matches(&b.name, name))
            .map(|(_, _, b)| b.clone())
            .collect())
    }

    async fn create_backend(&self, zone: &Zone, lb_id: &str, name: &str, forward_port: u32, health_check: &HealthCheck) -> Result<Backend, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let id = guard.next_id("bk");
        let backend = Backend {
            id,
            name: name.to_string(),
            forward_port,
            pool: vec![],
            health_check: Some(health_check.clone()),
        };
        guard.log(format!("create_backend {name}"));
        guard.backends.push((zone.to_string(), lb_id.to_string(), backend.clone()));
        Ok(backend)
    }

    async fn delete_backend(&self, zone: &Zone, backend_id: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("delete_backend {backend_id}"));
        guard.backends.retain(|(z, _, b)| z != &zone.to_string() || b.id != backend_id);
        Ok(())
    }

    async fn add_backend_servers(&self, zone: &Zone, backend_id: &str, server_ips: &[String]) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("add_backend_servers {backend_id} {}", server_ips.join(",")));
        for (z, _, backend) in &mut guard.backends {
            if z == &zone.to_string() && backend.id == backend_id {
                for ip in server_ips {
                    if !backend.pool.contains(ip) {
                        backend.pool.push(ip.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn remove_backend_servers(&self, zone: &Zone, backend_id: &str, server_ips: &[String]) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("remove_backend_servers {backend_id} {}", server_ips.join(",")));
        for (z, _, backend) in &mut guard.backends {
            if z == &zone.to_string() && backend.id == backend_id {
                backend.pool.retain(|ip| !server_ips.contains(ip));
            }
        }
        Ok(())
    }

    async fn list_frontends(&self, zone: &Zone, lb_id: &str, name: Option<&str>) -> Result<Vec<Frontend>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .frontends
            .iter()
            .filter(|(z, l, f)| z == &zone.to_string() && l == lb_id && name_matches(&f.name, name))
            .map(|(_, _, f)| f.clone())
            .collect())
    }

    async fn create_frontend(&self, zone: &Zone, lb_id: &str, name: &str, inbound_port: u32, backend_id: &str) -> Result<Frontend, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let id = guard.next_id("ft");
        let frontend = Frontend {
            id,
            name: name.to_string(),
            inbound_port,
            backend_id: Some(backend_id.to_string()),
        };
        guard.log(format!("create_frontend {name}"));
        guard.frontends.push((zone.to_string(), lb_id.to_string(), frontend.clone()));
        Ok(frontend)
    }

    async fn delete_frontend(&self, zone: &Zone, frontend_id: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("delete_frontend {frontend_id}"));
        guard.frontends.retain(|(z, _, f)| z != &zone.to_string() || f.id != frontend_id);
        Ok(())
    }

    async fn list_acls(&self, zone: &Zone, frontend_id: &str, name: Option<&str>) -> Result<Vec<Acl>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .acls
            .iter()
            .filter(|(z, f, a)| z == &zone.to_string() && f == frontend_id && name_matches(&a.name, name))
            .map(|(_, _, a)| a.clone())
            .collect())
    }

    async fn create_acl(&self, zone: &Zone, frontend_id: &str, name: &str, index: i32, action_type: AclActionType, ip_subnets: &[String]) -> Result<Acl, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let id = guard.next_id("acl");
        let acl = Acl {
            id,
            name: name.to_string(),
            index,
            action: AclAction { action_type },
            acl_match: Some(AclMatch {
                ip_subnet: ip_subnets.to_vec(),
            }),
        };
        guard.log(format!("create_acl {name}"));
        guard.acls.push((zone.to_string(), frontend_id.to_string(), acl.clone()));
        Ok(acl)
    }

    async fn update_acl(&self, zone: &Zone, acl_id: &str, name: &str, index: i32, action_type: AclActionType, ip_subnets: &[String]) -> Result<Acl, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("update_acl {name}"));
        for (z, _, acl) in &mut guard.acls {
            if z == &zone.to_string() && acl.id == acl_id {
                acl.name = name.to_string();
                acl.index = index;
                acl.action = AclAction { action_type };
                acl.acl_match = Some(AclMatch {
                    ip_subnet: ip_subnets.to_vec(),
                });
                return Ok(acl.clone());
            }
        }
        Err(ScalewayError::Api {
            status: 404,
            message: format!("acl {acl_id} not found"),
        })
    }

    async fn delete_acl(&self, zone: &Zone, acl_id: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("delete_acl {acl_id}"));
        guard.acls.retain(|(z, _, a)| !(z == &zone.to_string() && a.id == acl_id));
        Ok(())
    }

    async fn list_lb_private_networks(&self, zone: &Zone, lb_id: &str) -> Result<Vec<LbPrivateNetwork>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .lb_private_networks
            .iter()
            .filter(|(z, l, _)| z == &zone.to_string() && l == lb_id)
            .map(|(_, _, pn)| pn.clone())
            .collect())
    }

    async fn attach_lb_private_network(&self, zone: &Zone, lb_id: &str, private_network_id: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("attach_lb_private_network {lb_id} {private_network_id}"));
        guard.lb_private_networks.push((
            zone.to_string(),
            lb_id.to_string(),
            LbPrivateNetwork {
                private_network_id: private_network_id.to_string(),
            },
        ));
        Ok(())
    }

    // Instance operations
    async fn list_servers(&self, zone: &Zone, name: Option<&str>, tags: &[String]) -> Result<Vec<Server>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .servers
            .iter()
            .filter(|(z, s)| {
                z == &zone.to_string() && name_matches(&s.name, name) && has_tags(&s.tags, tags)
            })
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn create_server(&self, zone: &Zone, request: &CreateServerRequest) -> Result<Server, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let public_ip = match &request.public_ip_id {
            Some(ip_id) => {
                let ip = guard
                    .instance_ips
                    .iter()
                    .find(|(_, ip)| &ip.id == ip_id)
                    .map(|(_, ip)| ip.clone())
                    .ok_or(ScalewayError::Api {
                        status: 404,
                        message: format!("instance ip {ip_id} not found"),
                    })?;
                Some(ServerIp {
                    id: ip.id,
                    address: ip.address,
                    dynamic: false,
                })
            }
            None => None,
        };
        let id = guard.next_id("srv");
        let volume_id = guard.next_id("vol");
        let server = Server {
            id,
            name: request.name.clone(),
            state: ServerState::Stopped,
            commercial_type: request.commercial_type.clone(),
            tags: request.tags.clone(),
            public_ip,
            volumes: [(
                "0".to_string(),
                VolumeServer {
                    id: volume_id,
                    boot: true,
                    volume_type: Some(request.root_volume_type),
                },
            )]
            .into_iter()
            .collect(),
        };
        guard.log(format!("create_server {}", request.name));
        guard.servers.push((zone.to_string(), server.clone()));
        Ok(server)
    }

    async fn get_server(&self, zone: &Zone, id: &str) -> Result<Server, ScalewayError> {
        let guard = self.state.lock().unwrap();
        guard
            .servers
            .iter()
            .find(|(z, s)| z == &zone.to_string() && s.id == id)
            .map(|(_, s)| s.clone())
            .ok_or(ScalewayError::Api {
                status: 404,
                message: format!("server {id} not found"),
            })
    }

    async fn delete_server(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let state = guard
            .servers
            .iter()
            .find(|(z, s)| z == &zone.to_string() && s.id == id)
            .map(|(_, s)| s.state);
        match state {
            Some(ServerState::Stopped) => {}
            Some(_) => {
                return Err(ScalewayError::Api {
                    status: 400,
                    message: format!("server {id} should be stopped"),
                });
            }
            None => {
                return Err(ScalewayError::Api {
                    status: 404,
                    message: format!("server {id} not found"),
                });
            }
        }
        guard.log(format!("delete_server {id}"));
        guard.servers.retain(|(z, s)| !(z == &zone.to_string() && s.id == id));
        guard.private_nics.retain(|(z, nic)| !(z == &zone.to_string() && nic.server_id == id));
        Ok(())
    }

    async fn server_action(&self, zone: &Zone, id: &str, action: ServerAction) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("server_action {id} {action:?}"));
        for (z, server) in &mut guard.servers {
            if z == &zone.to_string() && server.id == id {
                server.state = match action {
                    ServerAction::Poweron => ServerState::Running,
                    ServerAction::Poweroff => ServerState::Stopped,
                    ServerAction::Terminate => ServerState::Stopping,
                };
                return Ok(());
            }
        }
        Err(ScalewayError::Api {
            status: 404,
            message: format!("server {id} not found"),
        })
    }

    async fn list_server_user_data(&self, zone: &Zone, server_id: &str) -> Result<Vec<String>, ScalewayError> {
        let _ = zone;
        let guard = self.state.lock().unwrap();
        Ok(guard
            .user_data
            .keys()
            .filter(|(s, _)| s == server_id)
            .map(|(_, key)| key.clone())
            .collect())
    }

    async fn set_server_user_data(&self, zone: &Zone, server_id: &str, key: &str, content: &str) -> Result<(), ScalewayError> {
        let _ = zone;
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("set_server_user_data {server_id} {key}"));
        guard
            .user_data
            .insert((server_id.to_string(), key.to_string()), content.to_string());
        Ok(())
    }

    async fn list_instance_ips(&self, zone: &Zone, tags: &[String]) -> Result<Vec<InstanceIp>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .instance_ips
            .iter()
            .filter(|(z, ip)| z == &zone.to_string() && has_tags(&ip.tags, tags))
            .map(|(_, ip)| ip.clone())
            .collect())
    }

    async fn create_instance_ip(&self, zone: &Zone, tags: &[String]) -> Result<InstanceIp, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let id = guard.next_id("ip");
        let ip = InstanceIp {
            id: id.clone(),
            address: format!("163.172.0.{}", guard.next_id),
            tags: tags.to_vec(),
        };
        guard.log(format!("create_instance_ip {id}"));
        guard.instance_ips.push((zone.to_string(), ip.clone()));
        Ok(ip)
    }

    async fn delete_instance_ip(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("delete_instance_ip {id}"));
        guard.instance_ips.retain(|(z, ip)| !(z == &zone.to_string() && ip.id == id));
        for (_, server) in &mut guard.servers {
            if server.public_ip.as_ref().is_some_and(|ip| ip.id == id) {
                server.public_ip = None;
            }
        }
        Ok(())
    }

    async fn list_private_nics(&self, zone: &Zone, server_id: &str) -> Result<Vec<PrivateNic>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .private_nics
            .iter()
            .filter(|(z, nic)| z == &zone.to_string() && nic.server_id == server_id)
            .map(|(_, nic)| nic.clone())
            .collect())
    }

    async fn create_private_nic(&self, zone: &Zone, server_id: &str, private_network_id: &str) -> Result<PrivateNic, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let id = guard.next_id("nic");
        let nic = PrivateNic {
            id: id.clone(),
            server_id: server_id.to_string(),
            private_network_id: private_network_id.to_string(),
        };
        // DHCP hands the NIC an address, registered with IPAM.
        let ipam_id = guard.next_id("ipam");
        let address = format!("10.0.0.{}/22", guard.next_id);
        guard.ipam_ips.entry(id.clone()).or_default().push(IpamIp {
            id: ipam_id,
            address,
        });
        guard.log(format!("create_private_nic {server_id} {private_network_id}"));
        guard.private_nics.push((zone.to_string(), nic.clone()));
        Ok(nic)
    }

    async fn detach_volume(&self, zone: &Zone, server_id: &str, slot: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("detach_volume {server_id} {slot}"));
        for (z, server) in &mut guard.servers {
            if z == &zone.to_string() && server.id == server_id {
                server.volumes.remove(slot);
            }
        }
        Ok(())
    }

    async fn delete_volume(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        let _ = zone;
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("delete_volume {id}"));
        Ok(())
    }

    // Security group operations
    async fn list_security_groups(&self, zone: &Zone, name: Option<&str>, tags: &[String]) -> Result<Vec<SecurityGroup>, ScalewayError> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .security_groups
            .iter()
            .filter(|(z, sg)| {
                z == &zone.to_string() && name_matches(&sg.name, name) && has_tags(&sg.tags, tags)
            })
            .map(|(_, sg)| sg.clone())
            .collect())
    }

    async fn create_security_group(&self, zone: &Zone, request: &CreateSecurityGroupRequest) -> Result<SecurityGroup, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        let id = guard.next_id("sg");
        let sg = SecurityGroup {
            id,
            name: request.name.clone(),
            zone: zone.to_string(),
            tags: request.tags.clone(),
            inbound_default_policy: request.inbound_default_policy,
            outbound_default_policy: request.outbound_default_policy,
            enable_default_security: request.enable_default_security,
            stateful: request.stateful,
        };
        guard.log(format!("create_security_group {} {}", request.name, zone));
        guard.security_groups.push((zone.to_string(), sg.clone()));
        Ok(sg)
    }

    async fn update_security_group(&self, zone: &Zone, id: &str, inbound_default_policy: SecurityGroupPolicy, outbound_default_policy: SecurityGroupPolicy, stateful: bool) -> Result<SecurityGroup, ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("update_security_group {id}"));
        for (z, sg) in &mut guard.security_groups {
            if z == &zone.to_string() && sg.id == id {
                sg.inbound_default_policy = inbound_default_policy;
                sg.outbound_default_policy = outbound_default_policy;
                sg.stateful = stateful;
                return Ok(sg.clone());
            }
        }
        Err(ScalewayError::Api {
            status: 404,
            message: format!("security group {id} not found"),
        })
    }

    async fn delete_security_group(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("delete_security_group {id}"));
        guard.security_groups.retain(|(z, sg)| !(z == &zone.to_string() && sg.id == id));
        guard.security_group_rules.remove(id);
        Ok(())
    }

    async fn list_security_group_rules(&self, zone: &Zone, security_group_id: &str) -> Result<Vec<SecurityGroupRule>, ScalewayError> {
        let _ = zone;
        let guard = self.state.lock().unwrap();
        Ok(guard
            .security_group_rules
            .get(security_group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_security_group_rules(&self, zone: &Zone, security_group_id: &str, rules: &[SetSecurityGroupRule]) -> Result<(), ScalewayError> {
        let _ = zone;
        let mut guard = self.state.lock().unwrap();
        guard.log(format!("set_security_group_rules {security_group_id} ({} rules)", rules.len()));
        let stored = rules
            .iter()
            .map(|rule| {
                let id = guard.next_id("rule");
                SecurityGroupRule {
                    id,
                    direction: rule.direction,
                    action: rule.action,
                    protocol: rule.protocol,
                    ip_range: rule.ip_range.clone(),
                    dest_port_from: rule.dest_port_from,
                    dest_port_to: rule.dest_port_to,
                    position: rule.position,
                }
            })
            .collect();
        guard
            .security_group_rules
            .insert(security_group_id.to_string(), stored);
        Ok(())
    }

    // Marketplace operations
    async fn get_local_image_id_by_label(&self, zone: &Zone, commercial_type: &str, label: &str) -> Result<String, ScalewayError> {
        let guard = self.state.lock().unwrap();
        guard
            .local_images
            .iter()
            .find(|(z, ct, image)| {
                z == &zone.to_string() && ct == commercial_type && image.label.as_deref() == Some(label)
            })
            .map(|(_, _, image)| image.id.clone())
            .ok_or(ScalewayError::NoItemFound)
    }

    // IPAM operations
    async fn list_ipam_ips(&self, region: &Region, resource_id: &str, resource_type: &str, is_ipv6: bool) -> Result<Vec<IpamIp>, ScalewayError> {
        let _ = (region, resource_type);
        if is_ipv6 {
            return Ok(vec![]);
        }
        let guard = self.state.lock().unwrap();
        Ok(guard.ipam_ips.get(resource_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: &str, name: &str) -> Server {
        Server {
            id: id.to_string(),
            name: name.to_string(),
            state: ServerState::Stopped,
            commercial_type: "PRO2-S".to_string(),
            tags: vec![],
            public_ip: None,
            volumes: Default::default(),
        }
    }

    // The list endpoints filter by substring like the real API, the find
    // helpers must still match the full name only.
    #[tokio::test]
    async fn find_by_name_is_exact() {
        let client = MockScalewayClient::new();
        let zone = Zone::from("fr-par-1");
        client.seed_server(&zone, server("srv-1", "caps-node-1"));
        client.seed_server(&zone, server("srv-10", "caps-node-10"));

        let found = client.find_server_by_name(&zone, "caps-node-1").await.unwrap();
        assert_eq!(found.id, "srv-1");
    }

    #[tokio::test]
    async fn duplicate_names_are_ambiguous() {
        let client = MockScalewayClient::new();
        let zone = Zone::from("fr-par-1");
        client.seed_server(&zone, server("srv-a", "caps-node-0"));
        client.seed_server(&zone, server("srv-b", "caps-node-0"));

        let err = client.find_server_by_name(&zone, "caps-node-0").await.unwrap_err();
        assert!(matches!(err, ScalewayError::TooManyItemsFound(2)));
    }
}
