//! ScalewayClient trait for mocking
//!
//! This trait abstracts the ScalewayClient to enable mocking in unit tests.
//! The concrete ScalewayClient implements this trait, and tests can use mock
//! implementations.
//!
//! Find helpers have default implementations on top of the list operations so
//! the HTTP client and mocks share the same exact-match semantics.

use crate::error::ScalewayError;
use crate::models::*;
use crate::types::{Region, Zone};

/// Trait for Scaleway API client operations
///
/// This trait enables mocking of Scaleway API calls for unit testing.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ScalewayClientTrait: Send + Sync {
    /// Project the client is scoped to. All created resources land here.
    fn project_id(&self) -> &str;

    // VPC operations (regional)
    async fn list_private_networks(&self, region: &Region, name: Option<&str>) -> Result<Vec<PrivateNetwork>, ScalewayError>;
    async fn create_private_network(&self, region: &Region, name: &str, subnets: &[String], tags: &[String]) -> Result<PrivateNetwork, ScalewayError>;
    async fn get_private_network(&self, region: &Region, id: &str) -> Result<PrivateNetwork, ScalewayError>;
    async fn delete_private_network(&self, region: &Region, id: &str) -> Result<(), ScalewayError>;

    // Public gateway operations (zoned)
    async fn list_gateways(&self, zone: &Zone, name: Option<&str>) -> Result<Vec<Gateway>, ScalewayError>;
    async fn create_gateway(&self, zone: &Zone, name: &str, gateway_type: &str, ip_id: Option<&str>, tags: &[String]) -> Result<Gateway, ScalewayError>;
    async fn delete_gateway(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError>;
    async fn list_gateway_ips(&self, zone: &Zone, tags: &[String]) -> Result<Vec<GatewayIp>, ScalewayError>;
    async fn create_gateway_ip(&self, zone: &Zone, tags: &[String]) -> Result<GatewayIp, ScalewayError>;
    async fn delete_gateway_ip(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError>;
    async fn list_gateway_networks(&self, zone: &Zone, gateway_id: Option<&str>, private_network_id: Option<&str>) -> Result<Vec<GatewayNetwork>, ScalewayError>;
    async fn create_gateway_network(&self, zone: &Zone, gateway_id: &str, private_network_id: &str, enable_dhcp: bool, enable_masquerade: bool, push_default_route: bool) -> Result<GatewayNetwork, ScalewayError>;
    async fn delete_gateway_network(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError>;

    // Load balancer operations (zoned)
    async fn list_lbs(&self, zone: &Zone, name: Option<&str>) -> Result<Vec<Lb>, ScalewayError>;
    async fn create_lb(&self, zone: &Zone, name: &str, lb_type: &str, ip_id: Option<&str>, tags: &[String]) -> Result<Lb, ScalewayError>;
    async fn delete_lb(&self, zone: &Zone, id: &str, release_ip: bool) -> Result<(), ScalewayError>;
    async fn list_lb_ips(&self, zone: &Zone, ip_address: Option<&str>) -> Result<Vec<LbIp>, ScalewayError>;
    async fn list_backends(&self, zone: &Zone, lb_id: &str, name: Option<&str>) -> Result<Vec<Backend>, ScalewayError>;
    async fn create_backend(&self, zone: &Zone, lb_id: &str, name: &str, forward_port: u32, health_check: &HealthCheck) -> Result<Backend, ScalewayError>;
    async fn delete_backend(&self, zone: &Zone, backend_id: &str) -> Result<(), ScalewayError>;
    async fn add_backend_servers(&self, zone: &Zone, backend_id: &str, server_ips: &[String]) -> Result<(), ScalewayError>;
    async fn remove_backend_servers(&self, zone: &Zone, backend_id: &str, server_ips: &[String]) -> Result<(), ScalewayError>;
    async fn list_frontends(&self, zone: &Zone, lb_id: &str, name: Option<&str>) -> Result<Vec<Frontend>, ScalewayError>;
    async fn create_frontend(&self, zone: &Zone, lb_id: &str, name: &str, inbound_port: u32, backend_id: &str) -> Result<Frontend, ScalewayError>;
    async fn delete_frontend(&self, zone: &Zone, frontend_id: &str) -> Result<(), ScalewayError>;
    async fn list_acls(&self, zone: &Zone, frontend_id: &str, name: Option<&str>) -> Result<Vec<Acl>, ScalewayError>;
    async fn create_acl(&self, zone: &Zone, frontend_id: &str, name: &str, index: i32, action_type: AclActionType, ip_subnets: &[String]) -> Result<Acl, ScalewayError>;
    async fn update_acl(&self, zone: &Zone, acl_id: &str, name: &str, index: i32, action_type: AclActionType, ip_subnets: &[String]) -> Result<Acl, ScalewayError>;
    async fn delete_acl(&self, zone: &Zone, acl_id: &str) -> Result<(), ScalewayError>;
    async fn list_lb_private_networks(&self, zone: &Zone, lb_id: &str) -> Result<Vec<LbPrivateNetwork>, ScalewayError>;
    async fn attach_lb_private_network(&self, zone: &Zone, lb_id: &str, private_network_id: &str) -> Result<(), ScalewayError>;

    // Instance operations (zoned)
    async fn list_servers(&self, zone: &Zone, name: Option<&str>, tags: &[String]) -> Result<Vec<Server>, ScalewayError>;
    async fn create_server(&self, zone: &Zone, request: &CreateServerRequest) -> Result<Server, ScalewayError>;
    async fn get_server(&self, zone: &Zone, id: &str) -> Result<Server, ScalewayError>;
    async fn delete_server(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError>;
    async fn server_action(&self, zone: &Zone, id: &str, action: ServerAction) -> Result<(), ScalewayError>;
    async fn list_server_user_data(&self, zone: &Zone, server_id: &str) -> Result<Vec<String>, ScalewayError>;
    async fn set_server_user_data(&self, zone: &Zone, server_id: &str, key: &str, content: &str) -> Result<(), ScalewayError>;
    async fn list_instance_ips(&self, zone: &Zone, tags: &[String]) -> Result<Vec<InstanceIp>, ScalewayError>;
    async fn create_instance_ip(&self, zone: &Zone, tags: &[String]) -> Result<InstanceIp, ScalewayError>;
    async fn delete_instance_ip(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError>;
    async fn list_private_nics(&self, zone: &Zone, server_id: &str) -> Result<Vec<PrivateNic>, ScalewayError>;
    async fn create_private_nic(&self, zone: &Zone, server_id: &str, private_network_id: &str) -> Result<PrivateNic, ScalewayError>;
    async fn detach_volume(&self, zone: &Zone, server_id: &str, slot: &str) -> Result<(), ScalewayError>;
    async fn delete_volume(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError>;

    // Security group operations (zoned)
    async fn list_security_groups(&self, zone: &Zone, name: Option<&str>, tags: &[String]) -> Result<Vec<SecurityGroup>, ScalewayError>;
    async fn create_security_group(&self, zone: &Zone, request: &CreateSecurityGroupRequest) -> Result<SecurityGroup, ScalewayError>;
    async fn update_security_group(&self, zone: &Zone, id: &str, inbound_default_policy: SecurityGroupPolicy, outbound_default_policy: SecurityGroupPolicy, stateful: bool) -> Result<SecurityGroup, ScalewayError>;
    async fn delete_security_group(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError>;
    async fn list_security_group_rules(&self, zone: &Zone, security_group_id: &str) -> Result<Vec<SecurityGroupRule>, ScalewayError>;
    async fn set_security_group_rules(&self, zone: &Zone, security_group_id: &str, rules: &[SetSecurityGroupRule]) -> Result<(), ScalewayError>;

    // Marketplace operations (zoned)
    async fn get_local_image_id_by_label(&self, zone: &Zone, commercial_type: &str, label: &str) -> Result<String, ScalewayError>;

    // IPAM operations (regional)
    async fn list_ipam_ips(&self, region: &Region, resource_id: &str, resource_type: &str, is_ipv6: bool) -> Result<Vec<IpamIp>, ScalewayError>;

    // ------------------------------------------------------------------
    // Find helpers. Exact name/tag matches, erroring when not exactly one
    // resource matches.

    /// Find a private network by exact name in a region.
    async fn find_private_network_by_name(&self, region: &Region, name: &str) -> Result<PrivateNetwork, ScalewayError> {
        let pns: Vec<_> = self
            .list_private_networks(region, Some(name))
            .await?
            .into_iter()
            .filter(|pn| pn.name == name)
            .collect();
        exactly_one(pns)
    }

    /// Find a public gateway by exact name in a zone.
    async fn find_gateway_by_name(&self, zone: &Zone, name: &str) -> Result<Gateway, ScalewayError> {
        let gws: Vec<_> = self
            .list_gateways(zone, Some(name))
            .await?
            .into_iter()
            .filter(|gw| gw.name == name)
            .collect();
        exactly_one(gws)
    }

    /// Find a gateway flexible IP by its address.
    async fn find_gateway_ip_by_address(&self, zone: &Zone, address: &str) -> Result<GatewayIp, ScalewayError> {
        let ips: Vec<_> = self
            .list_gateway_ips(zone, &[])
            .await?
            .into_iter()
            .filter(|ip| ip.address == address)
            .collect();
        exactly_one(ips)
    }

    /// Find a gateway flexible IP carrying exactly the given tag set.
    async fn find_gateway_ip_by_tags(&self, zone: &Zone, tags: &[String]) -> Result<GatewayIp, ScalewayError> {
        let ips: Vec<_> = self
            .list_gateway_ips(zone, tags)
            .await?
            .into_iter()
            .filter(|ip| tags.iter().all(|t| ip.tags.contains(t)))
            .collect();
        exactly_one(ips)
    }

    /// Find all gateways attached to a private network across the given zones.
    async fn find_gateways_by_private_network_id(&self, zones: &[Zone], private_network_id: &str) -> Result<Vec<(Zone, GatewayNetwork)>, ScalewayError> {
        let mut out = Vec::new();
        for zone in zones {
            let gwnets = self
                .list_gateway_networks(zone, None, Some(private_network_id))
                .await?;
            out.extend(gwnets.into_iter().map(|gn| (zone.clone(), gn)));
        }
        Ok(out)
    }

    /// Find a load balancer by exact name in a zone.
    async fn find_lb_by_name(&self, zone: &Zone, name: &str) -> Result<Lb, ScalewayError> {
        let lbs: Vec<_> = self
            .list_lbs(zone, Some(name))
            .await?
            .into_iter()
            .filter(|lb| lb.name == name)
            .collect();
        exactly_one(lbs)
    }

    /// Find a load balancer flexible IP by its address.
    async fn find_lb_ip(&self, zone: &Zone, ip_address: &str) -> Result<LbIp, ScalewayError> {
        let ips: Vec<_> = self
            .list_lb_ips(zone, Some(ip_address))
            .await?
            .into_iter()
            .filter(|ip| ip.ip_address == ip_address)
            .collect();
        exactly_one(ips)
    }

    /// Find a backend of a load balancer by exact name.
    async fn find_backend_by_name(&self, zone: &Zone, lb_id: &str, name: &str) -> Result<Backend, ScalewayError> {
        let backends: Vec<_> = self
            .list_backends(zone, lb_id, Some(name))
            .await?
            .into_iter()
            .filter(|b| b.name == name)
            .collect();
        exactly_one(backends)
    }

    /// Find a frontend of a load balancer by exact name.
    async fn find_frontend_by_name(&self, zone: &Zone, lb_id: &str, name: &str) -> Result<Frontend, ScalewayError> {
        let frontends: Vec<_> = self
            .list_frontends(zone, lb_id, Some(name))
            .await?
            .into_iter()
            .filter(|f| f.name == name)
            .collect();
        exactly_one(frontends)
    }

    /// Find an ACL of a frontend by exact name.
    async fn find_acl_by_name(&self, zone: &Zone, frontend_id: &str, name: &str) -> Result<Acl, ScalewayError> {
        let acls: Vec<_> = self
            .list_acls(zone, frontend_id, Some(name))
            .await?
            .into_iter()
            .filter(|a| a.name == name)
            .collect();
        exactly_one(acls)
    }

    /// Find a server by exact name in a zone.
    async fn find_server_by_name(&self, zone: &Zone, name: &str) -> Result<Server, ScalewayError> {
        let servers: Vec<_> = self
            .list_servers(zone, Some(name), &[])
            .await?
            .into_iter()
            .filter(|s| s.name == name)
            .collect();
        exactly_one(servers)
    }

    /// Find an instance flexible IP carrying exactly the given tag set.
    async fn find_instance_ip_by_tags(&self, zone: &Zone, tags: &[String]) -> Result<InstanceIp, ScalewayError> {
        let ips: Vec<_> = self
            .list_instance_ips(zone, tags)
            .await?
            .into_iter()
            .filter(|ip| tags.iter().all(|t| ip.tags.contains(t)))
            .collect();
        exactly_one(ips)
    }

    /// Find the private NIC attaching a server to a private network.
    async fn find_private_nic(&self, zone: &Zone, server_id: &str, private_network_id: &str) -> Result<PrivateNic, ScalewayError> {
        let nics: Vec<_> = self
            .list_private_nics(zone, server_id)
            .await?
            .into_iter()
            .filter(|nic| nic.private_network_id == private_network_id)
            .collect();
        exactly_one(nics)
    }

    /// Find a security group by exact name in a zone.
    async fn find_security_group_by_name(&self, zone: &Zone, name: &str) -> Result<SecurityGroup, ScalewayError> {
        let groups: Vec<_> = self
            .list_security_groups(zone, Some(name), &[])
            .await?
            .into_iter()
            .filter(|sg| sg.name == name)
            .collect();
        exactly_one(groups)
    }

    /// Find the IPv4 address of a private NIC, stripped of its CIDR suffix.
    async fn find_ipv4_by_private_nic_id(&self, region: &Region, private_nic_id: &str) -> Result<String, ScalewayError> {
        let ips = self
            .list_ipam_ips(region, private_nic_id, "instance_private_nic", false)
            .await?;
        let ip = exactly_one(ips)?;
        let address = ip
            .address
            .split_once('/')
            .map_or(ip.address.as_str(), |(addr, _)| addr)
            .to_string();
        Ok(address)
    }
}

/// Reduce a match list to its single element.
fn exactly_one<T>(mut items: Vec<T>) -> Result<T, ScalewayError> {
    match items.len() {
        0 => Err(ScalewayError::NoItemFound),
        1 => Ok(items.remove(0)),
        n => Err(ScalewayError::TooManyItemsFound(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::exactly_one;
    use crate::error::ScalewayError;

    #[test]
    fn exactly_one_empty() {
        let result: Result<u32, _> = exactly_one(vec![]);
        assert!(matches!(result, Err(ScalewayError::NoItemFound)));
    }

    #[test]
    fn exactly_one_single() {
        assert_eq!(exactly_one(vec![7]).unwrap(), 7);
    }

    #[test]
    fn exactly_one_ambiguous() {
        let result = exactly_one(vec![1, 2, 3]);
        assert!(matches!(result, Err(ScalewayError::TooManyItemsFound(3))));
    }
}
