//! Scaleway API client
//!
//! Implements the Scaleway REST API client for the products the controllers
//! drive. Paths follow the per-product layout of the public API:
//! `/vpc/v2/regions/{region}/...`, `/vpc-gw/v1/zones/{zone}/...`,
//! `/lb/v1/zones/{zone}/...`, `/instance/v1/zones/{zone}/...`,
//! `/ipam/v1/regions/{region}/...` and `/marketplace/v2/...`.

use crate::error::ScalewayError;
use crate::models::*;
use crate::scaleway_trait::ScalewayClientTrait;
use crate::types::{Region, Zone};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const DEFAULT_API_URL: &str = "https://api.scaleway.com";
const PER_PAGE: usize = 50;

/// Scaleway API client
pub struct ScalewayClient {
    client: Client,
    base_url: String,
    secret_key: String,
    access_key: String,
    project_id: String,
}

// The secret key must never leak into logs or panic messages.
impl std::fmt::Debug for ScalewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalewayClient")
            .field("base_url", &self.base_url)
            .field("access_key", &self.access_key)
            .field("project_id", &self.project_id)
            .field("secret_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

// List endpoint envelopes. Every Scaleway list response wraps its items in a
// product-specific key.
#[derive(serde::Deserialize)]
struct PrivateNetworksPage {
    private_networks: Vec<PrivateNetwork>,
}
#[derive(serde::Deserialize)]
struct GatewaysPage {
    gateways: Vec<Gateway>,
}
#[derive(serde::Deserialize)]
struct GatewayIpsPage {
    ips: Vec<GatewayIp>,
}
#[derive(serde::Deserialize)]
struct GatewayNetworksPage {
    gateway_networks: Vec<GatewayNetwork>,
}
#[derive(serde::Deserialize)]
struct LbsPage {
    lbs: Vec<Lb>,
}
#[derive(serde::Deserialize)]
struct LbIpsPage {
    ips: Vec<LbIp>,
}
#[derive(serde::Deserialize)]
struct BackendsPage {
    backends: Vec<Backend>,
}
#[derive(serde::Deserialize)]
struct FrontendsPage {
    frontends: Vec<Frontend>,
}
#[derive(serde::Deserialize)]
struct AclsPage {
    acls: Vec<Acl>,
}
#[derive(serde::Deserialize)]
struct LbPrivateNetworksPage {
    private_network: Vec<LbPrivateNetwork>,
}
#[derive(serde::Deserialize)]
struct ServersPage {
    servers: Vec<Server>,
}
#[derive(serde::Deserialize)]
struct InstanceIpsPage {
    ips: Vec<InstanceIp>,
}
#[derive(serde::Deserialize)]
struct PrivateNicsPage {
    private_nics: Vec<PrivateNic>,
}
#[derive(serde::Deserialize)]
struct SecurityGroupsPage {
    security_groups: Vec<SecurityGroup>,
}
#[derive(serde::Deserialize)]
struct SecurityGroupRulesPage {
    rules: Vec<SecurityGroupRule>,
}
#[derive(serde::Deserialize)]
struct LocalImagesPage {
    local_images: Vec<LocalImage>,
}
#[derive(serde::Deserialize)]
struct IpamIpsPage {
    ips: Vec<IpamIp>,
}

// Single-object envelopes used by create/get endpoints.
#[derive(serde::Deserialize)]
struct PrivateNetworkEnvelope {
    private_network: PrivateNetwork,
}
#[derive(serde::Deserialize)]
struct ServerEnvelope {
    server: Server,
}
#[derive(serde::Deserialize)]
struct IpEnvelope<T> {
    ip: T,
}
#[derive(serde::Deserialize)]
struct SecurityGroupEnvelope {
    security_group: SecurityGroup,
}
#[derive(serde::Deserialize)]
struct UserDataKeysEnvelope {
    user_data: Vec<String>,
}

impl ScalewayClient {
    /// Create a new Scaleway client
    ///
    /// # Arguments
    /// * `access_key` - API access key (logged, never sent as a secret)
    /// * `secret_key` - API secret key sent as `X-Auth-Token`
    /// * `project_id` - Project all created resources belong to
    /// * `api_url` - Override of the API endpoint, defaults to the public one
    pub fn new(
        access_key: String,
        secret_key: String,
        project_id: String,
        api_url: Option<String>,
    ) -> Result<Self, ScalewayError> {
        if secret_key.is_empty() {
            return Err(ScalewayError::InvalidRequest(
                "secret key must not be empty".to_string(),
            ));
        }
        if project_id.is_empty() {
            return Err(ScalewayError::InvalidRequest(
                "project id must not be empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ScalewayError::Http)?;

        Ok(Self {
            client,
            base_url: api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            secret_key,
            access_key,
            project_id,
        })
    }

    /// Get the API access key
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Get the project ID
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Build a query string from key/value pairs, percent-encoding values.
    fn query_string(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Map a non-success response to an error, extracting the API message.
    async fn error_from_response(response: reqwest::Response) -> ScalewayError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(body);
        if status == 412 {
            ScalewayError::Precondition(message)
        } else {
            ScalewayError::Api { status, message }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, ScalewayError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", &self.secret_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(ScalewayError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ScalewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("X-Auth-Token", &self.secret_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(ScalewayError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(response.json().await?)
    }

    /// POST where the response body is irrelevant (server actions, attaches).
    async fn post_unit(&self, path: &str, body: serde_json::Value) -> Result<(), ScalewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("X-Auth-Token", &self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(ScalewayError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn patch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ScalewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("PATCH {}", url);

        let response = self
            .client
            .patch(&url)
            .header("X-Auth-Token", &self.secret_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(ScalewayError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(response.json().await?)
    }

    async fn put_unit(&self, path: &str, body: serde_json::Value) -> Result<(), ScalewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("PUT {}", url);

        let response = self
            .client
            .put(&url)
            .header("X-Auth-Token", &self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(ScalewayError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    async fn delete_path(&self, path_and_query: &str) -> Result<(), ScalewayError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header("X-Auth-Token", &self.secret_key)
            .send()
            .await
            .map_err(ScalewayError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    /// DELETE carrying a JSON body (used by backend pool membership).
    async fn delete_with_body(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(), ScalewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header("X-Auth-Token", &self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(ScalewayError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    /// Fetch all pages of a paginated list endpoint.
    ///
    /// Appends `page`/`per_page` to the given parameters and loops until a
    /// page comes back short.
    async fn list_all<P, T>(
        &self,
        base_path: &str,
        params: &[(&str, String)],
        extract: impl Fn(P) -> Vec<T>,
    ) -> Result<Vec<T>, ScalewayError>
    where
        P: DeserializeOwned,
    {
        let mut all_results = Vec::new();
        let mut page = 1usize;

        loop {
            let mut query: Vec<(&str, String)> = params.to_vec();
            query.push(("page", page.to_string()));
            query.push(("per_page", PER_PAGE.to_string()));
            let url = format!("{}?{}", base_path, Self::query_string(&query));

            let envelope: P = self.get_json(&url).await?;
            let items = extract(envelope);
            let count = items.len();
            all_results.extend(items);

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(all_results)
    }

    fn instance_path(zone: &Zone, suffix: &str) -> String {
        format!("/instance/v1/zones/{}/{}", zone, suffix)
    }

    fn lb_path(zone: &Zone, suffix: &str) -> String {
        format!("/lb/v1/zones/{}/{}", zone, suffix)
    }

    fn vpcgw_path(zone: &Zone, suffix: &str) -> String {
        format!("/vpc-gw/v1/zones/{}/{}", zone, suffix)
    }

    fn vpc_path(region: &Region, suffix: &str) -> String {
        format!("/vpc/v2/regions/{}/{}", region, suffix)
    }

    // ------------------------------------------------------------------
    // VPC

    /// List private networks in a region, optionally filtered by name.
    ///
    /// The name filter is a substring match on the provider side.
    pub async fn list_private_networks(
        &self,
        region: &Region,
        name: Option<&str>,
    ) -> Result<Vec<PrivateNetwork>, ScalewayError> {
        let mut params = vec![("project_id", self.project_id.clone())];
        if let Some(name) = name {
            params.push(("name", name.to_string()));
        }
        self.list_all(
            &Self::vpc_path(region, "private-networks"),
            &params,
            |p: PrivateNetworksPage| p.private_networks,
        )
        .await
    }

    /// Create a private network with managed DHCP.
    pub async fn create_private_network(
        &self,
        region: &Region,
        name: &str,
        subnets: &[String],
        tags: &[String],
    ) -> Result<PrivateNetwork, ScalewayError> {
        let envelope: PrivateNetworkEnvelope = self
            .post_json(
                &Self::vpc_path(region, "private-networks"),
                json!({
                    "name": name,
                    "project_id": self.project_id,
                    "subnets": subnets,
                    "tags": tags,
                }),
            )
            .await?;
        Ok(envelope.private_network)
    }

    /// Get a private network by ID.
    pub async fn get_private_network(
        &self,
        region: &Region,
        id: &str,
    ) -> Result<PrivateNetwork, ScalewayError> {
        self.get_json(&Self::vpc_path(region, &format!("private-networks/{id}")))
            .await
    }

    /// Delete a private network. Fails with a precondition error while
    /// resources are still attached.
    pub async fn delete_private_network(
        &self,
        region: &Region,
        id: &str,
    ) -> Result<(), ScalewayError> {
        self.delete_path(&Self::vpc_path(region, &format!("private-networks/{id}")))
            .await
    }

    // ------------------------------------------------------------------
    // Public gateways

    /// List public gateways in a zone, optionally filtered by name.
    pub async fn list_gateways(
        &self,
        zone: &Zone,
        name: Option<&str>,
    ) -> Result<Vec<Gateway>, ScalewayError> {
        let mut params = vec![("project_id", self.project_id.clone())];
        if let Some(name) = name {
            params.push(("name", name.to_string()));
        }
        self.list_all(&Self::vpcgw_path(zone, "gateways"), &params, |p: GatewaysPage| {
            p.gateways
        })
        .await
    }

    /// Create a public gateway, optionally reusing an existing flexible IP.
    pub async fn create_gateway(
        &self,
        zone: &Zone,
        name: &str,
        gateway_type: &str,
        ip_id: Option<&str>,
        tags: &[String],
    ) -> Result<Gateway, ScalewayError> {
        let mut body = json!({
            "name": name,
            "type": gateway_type,
            "project_id": self.project_id,
            "tags": tags,
        });
        if let Some(ip_id) = ip_id {
            body["ip_id"] = json!(ip_id);
        }
        self.post_json(&Self::vpcgw_path(zone, "gateways"), body).await
    }

    /// Delete a public gateway.
    pub async fn delete_gateway(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_path(&Self::vpcgw_path(zone, &format!("gateways/{id}")))
            .await
    }

    /// List gateway flexible IPs, optionally filtered by tags.
    ///
    /// The provider matches tags as a superset, callers needing an exact set
    /// must filter further.
    pub async fn list_gateway_ips(
        &self,
        zone: &Zone,
        tags: &[String],
    ) -> Result<Vec<GatewayIp>, ScalewayError> {
        let mut params = vec![("project_id", self.project_id.clone())];
        if !tags.is_empty() {
            params.push(("tags", tags.join(",")));
        }
        self.list_all(&Self::vpcgw_path(zone, "ips"), &params, |p: GatewayIpsPage| p.ips)
            .await
    }

    /// Reserve a gateway flexible IP.
    pub async fn create_gateway_ip(
        &self,
        zone: &Zone,
        tags: &[String],
    ) -> Result<GatewayIp, ScalewayError> {
        self.post_json(
            &Self::vpcgw_path(zone, "ips"),
            json!({ "project_id": self.project_id, "tags": tags }),
        )
        .await
    }

    /// Release a gateway flexible IP.
    pub async fn delete_gateway_ip(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_path(&Self::vpcgw_path(zone, &format!("ips/{id}"))).await
    }

    /// List gateway/private-network attachments, optionally scoped to a
    /// gateway and/or a private network.
    pub async fn list_gateway_networks(
        &self,
        zone: &Zone,
        gateway_id: Option<&str>,
        private_network_id: Option<&str>,
    ) -> Result<Vec<GatewayNetwork>, ScalewayError> {
        let mut params = Vec::new();
        if let Some(gateway_id) = gateway_id {
            params.push(("gateway_id", gateway_id.to_string()));
        }
        if let Some(private_network_id) = private_network_id {
            params.push(("private_network_id", private_network_id.to_string()));
        }
        self.list_all(
            &Self::vpcgw_path(zone, "gateway-networks"),
            &params,
            |p: GatewayNetworksPage| p.gateway_networks,
        )
        .await
    }

    /// Attach a gateway to a private network.
    pub async fn create_gateway_network(
        &self,
        zone: &Zone,
        gateway_id: &str,
        private_network_id: &str,
        enable_dhcp: bool,
        enable_masquerade: bool,
        push_default_route: bool,
    ) -> Result<GatewayNetwork, ScalewayError> {
        self.post_json(
            &Self::vpcgw_path(zone, "gateway-networks"),
            json!({
                "gateway_id": gateway_id,
                "private_network_id": private_network_id,
                "enable_dhcp": enable_dhcp,
                "enable_masquerade": enable_masquerade,
                "push_default_route": push_default_route,
            }),
        )
        .await
    }

    /// Detach a gateway from a private network.
    pub async fn delete_gateway_network(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_path(&Self::vpcgw_path(zone, &format!("gateway-networks/{id}")))
            .await
    }

    // ------------------------------------------------------------------
    // Load balancers

    /// List load balancers in a zone, optionally filtered by name.
    pub async fn list_lbs(&self, zone: &Zone, name: Option<&str>) -> Result<Vec<Lb>, ScalewayError> {
        let mut params = vec![("project_id", self.project_id.clone())];
        if let Some(name) = name {
            params.push(("name", name.to_string()));
        }
        self.list_all(&Self::lb_path(zone, "lbs"), &params, |p: LbsPage| p.lbs)
            .await
    }

    /// Create a load balancer, optionally reusing an existing flexible IP.
    pub async fn create_lb(
        &self,
        zone: &Zone,
        name: &str,
        lb_type: &str,
        ip_id: Option<&str>,
        tags: &[String],
    ) -> Result<Lb, ScalewayError> {
        let mut body = json!({
            "name": name,
            "type": lb_type,
            "project_id": self.project_id,
            "tags": tags,
        });
        if let Some(ip_id) = ip_id {
            body["ip_id"] = json!(ip_id);
        }
        self.post_json(&Self::lb_path(zone, "lbs"), body).await
    }

    /// Delete a load balancer. `release_ip` also releases its flexible IPs.
    pub async fn delete_lb(
        &self,
        zone: &Zone,
        id: &str,
        release_ip: bool,
    ) -> Result<(), ScalewayError> {
        self.delete_path(&Self::lb_path(zone, &format!("lbs/{id}?release_ip={release_ip}")))
            .await
    }

    /// List load balancer flexible IPs, optionally filtered by address.
    pub async fn list_lb_ips(
        &self,
        zone: &Zone,
        ip_address: Option<&str>,
    ) -> Result<Vec<LbIp>, ScalewayError> {
        let mut params = vec![("project_id", self.project_id.clone())];
        if let Some(ip_address) = ip_address {
            params.push(("ip_address", ip_address.to_string()));
        }
        self.list_all(&Self::lb_path(zone, "ips"), &params, |p: LbIpsPage| p.ips)
            .await
    }

    /// List backends of a load balancer, optionally filtered by name.
    pub async fn list_backends(
        &self,
        zone: &Zone,
        lb_id: &str,
        name: Option<&str>,
    ) -> Result<Vec<Backend>, ScalewayError> {
        let mut params = Vec::new();
        if let Some(name) = name {
            params.push(("name", name.to_string()));
        }
        self.list_all(
            &Self::lb_path(zone, &format!("lbs/{lb_id}/backends")),
            &params,
            |p: BackendsPage| p.backends,
        )
        .await
    }

    /// Create a TCP backend with a TCP health check.
    pub async fn create_backend(
        &self,
        zone: &Zone,
        lb_id: &str,
        name: &str,
        forward_port: u32,
        health_check: &HealthCheck,
    ) -> Result<Backend, ScalewayError> {
        self.post_json(
            &Self::lb_path(zone, &format!("lbs/{lb_id}/backends")),
            json!({
                "name": name,
                "forward_protocol": "tcp",
                "forward_port": forward_port,
                "forward_port_algorithm": "roundrobin",
                "health_check": {
                    "port": health_check.port,
                    "check_max_retries": health_check.check_max_retries,
                    "tcp_config": {},
                },
                "server_ip": [],
            }),
        )
        .await
    }

    /// Delete a backend.
    pub async fn delete_backend(&self, zone: &Zone, backend_id: &str) -> Result<(), ScalewayError> {
        self.delete_path(&Self::lb_path(zone, &format!("backends/{backend_id}")))
            .await
    }

    /// Add servers to a backend pool.
    pub async fn add_backend_servers(
        &self,
        zone: &Zone,
        backend_id: &str,
        server_ips: &[String],
    ) -> Result<(), ScalewayError> {
        self.post_unit(
            &Self::lb_path(zone, &format!("backends/{backend_id}/servers")),
            json!({ "server_ip": server_ips }),
        )
        .await
    }

    /// Remove servers from a backend pool.
    pub async fn remove_backend_servers(
        &self,
        zone: &Zone,
        backend_id: &str,
        server_ips: &[String],
    ) -> Result<(), ScalewayError> {
        self.delete_with_body(
            &Self::lb_path(zone, &format!("backends/{backend_id}/servers")),
            json!({ "server_ip": server_ips }),
        )
        .await
    }

    /// List frontends of a load balancer, optionally filtered by name.
    pub async fn list_frontends(
        &self,
        zone: &Zone,
        lb_id: &str,
        name: Option<&str>,
    ) -> Result<Vec<Frontend>, ScalewayError> {
        let mut params = Vec::new();
        if let Some(name) = name {
            params.push(("name", name.to_string()));
        }
        self.list_all(
            &Self::lb_path(zone, &format!("lbs/{lb_id}/frontends")),
            &params,
            |p: FrontendsPage| p.frontends,
        )
        .await
    }

    /// Create a frontend bound to a backend.
    pub async fn create_frontend(
        &self,
        zone: &Zone,
        lb_id: &str,
        name: &str,
        inbound_port: u32,
        backend_id: &str,
    ) -> Result<Frontend, ScalewayError> {
        self.post_json(
            &Self::lb_path(zone, &format!("lbs/{lb_id}/frontends")),
            json!({
                "name": name,
                "inbound_port": inbound_port,
                "backend_id": backend_id,
            }),
        )
        .await
    }

    /// Delete a frontend.
    pub async fn delete_frontend(&self, zone: &Zone, frontend_id: &str) -> Result<(), ScalewayError> {
        self.delete_path(&Self::lb_path(zone, &format!("frontends/{frontend_id}")))
            .await
    }

    /// List ACLs of a frontend, optionally filtered by name.
    pub async fn list_acls(
        &self,
        zone: &Zone,
        frontend_id: &str,
        name: Option<&str>,
    ) -> Result<Vec<Acl>, ScalewayError> {
        let mut params = Vec::new();
        if let Some(name) = name {
            params.push(("name", name.to_string()));
        }
        self.list_all(
            &Self::lb_path(zone, &format!("frontends/{frontend_id}/acls")),
            &params,
            |p: AclsPage| p.acls,
        )
        .await
    }

    /// Create an ACL on a frontend.
    pub async fn create_acl(
        &self,
        zone: &Zone,
        frontend_id: &str,
        name: &str,
        index: i32,
        action_type: AclActionType,
        ip_subnets: &[String],
    ) -> Result<Acl, ScalewayError> {
        self.post_json(
            &Self::lb_path(zone, &format!("frontends/{frontend_id}/acls")),
            json!({
                "name": name,
                "index": index,
                "action": { "type": action_type },
                "match": { "ip_subnet": ip_subnets },
            }),
        )
        .await
    }

    /// Replace the definition of an ACL.
    pub async fn update_acl(
        &self,
        zone: &Zone,
        acl_id: &str,
        name: &str,
        index: i32,
        action_type: AclActionType,
        ip_subnets: &[String],
    ) -> Result<Acl, ScalewayError> {
        self.patch_json(
            &Self::lb_path(zone, &format!("acls/{acl_id}")),
            json!({
                "name": name,
                "index": index,
                "action": { "type": action_type },
                "match": { "ip_subnet": ip_subnets },
            }),
        )
        .await
    }

    /// Delete an ACL.
    pub async fn delete_acl(&self, zone: &Zone, acl_id: &str) -> Result<(), ScalewayError> {
        self.delete_path(&Self::lb_path(zone, &format!("acls/{acl_id}"))).await
    }

    /// List the private networks a load balancer is attached to.
    pub async fn list_lb_private_networks(
        &self,
        zone: &Zone,
        lb_id: &str,
    ) -> Result<Vec<LbPrivateNetwork>, ScalewayError> {
        self.list_all(
            &Self::lb_path(zone, &format!("lbs/{lb_id}/private-networks")),
            &[],
            |p: LbPrivateNetworksPage| p.private_network,
        )
        .await
    }

    /// Attach a load balancer to a private network.
    pub async fn attach_lb_private_network(
        &self,
        zone: &Zone,
        lb_id: &str,
        private_network_id: &str,
    ) -> Result<(), ScalewayError> {
        self.post_unit(
            &Self::lb_path(
                zone,
                &format!("lbs/{lb_id}/private-networks/{private_network_id}/attach"),
            ),
            json!({}),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Instances

    /// List servers in a zone, optionally filtered by name and tags.
    pub async fn list_servers(
        &self,
        zone: &Zone,
        name: Option<&str>,
        tags: &[String],
    ) -> Result<Vec<Server>, ScalewayError> {
        let mut params = vec![("project", self.project_id.clone())];
        if let Some(name) = name {
            params.push(("name", name.to_string()));
        }
        if !tags.is_empty() {
            params.push(("tags", tags.join(",")));
        }
        self.list_all(&Self::instance_path(zone, "servers"), &params, |p: ServersPage| {
            p.servers
        })
        .await
    }

    /// Create a server. The root volume lands in slot "0".
    pub async fn create_server(
        &self,
        zone: &Zone,
        request: &CreateServerRequest,
    ) -> Result<Server, ScalewayError> {
        let mut body = json!({
            "name": request.name,
            "commercial_type": request.commercial_type,
            "image": request.image,
            "project": self.project_id,
            "tags": request.tags,
            "dynamic_ip_required": false,
            "volumes": {
                "0": {
                    // volume sizes are expressed in bytes
                    "size": request.root_volume_size_gb * 1_000_000_000,
                    "volume_type": request.root_volume_type,
                },
            },
        });
        if let Some(security_group_id) = &request.security_group_id {
            body["security_group"] = json!(security_group_id);
        }
        if let Some(public_ip_id) = &request.public_ip_id {
            body["public_ip"] = json!(public_ip_id);
        }
        let envelope: ServerEnvelope = self
            .post_json(&Self::instance_path(zone, "servers"), body)
            .await?;
        Ok(envelope.server)
    }

    /// Get a server by ID.
    pub async fn get_server(&self, zone: &Zone, id: &str) -> Result<Server, ScalewayError> {
        let envelope: ServerEnvelope = self
            .get_json(&Self::instance_path(zone, &format!("servers/{id}")))
            .await?;
        Ok(envelope.server)
    }

    /// Delete a server. The server must be stopped.
    pub async fn delete_server(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_path(&Self::instance_path(zone, &format!("servers/{id}")))
            .await
    }

    /// Perform a lifecycle action on a server.
    pub async fn server_action(
        &self,
        zone: &Zone,
        id: &str,
        action: ServerAction,
    ) -> Result<(), ScalewayError> {
        self.post_unit(
            &Self::instance_path(zone, &format!("servers/{id}/action")),
            json!({ "action": action }),
        )
        .await
    }

    /// List the user data keys set on a server.
    pub async fn list_server_user_data(
        &self,
        zone: &Zone,
        server_id: &str,
    ) -> Result<Vec<String>, ScalewayError> {
        let envelope: UserDataKeysEnvelope = self
            .get_json(&Self::instance_path(zone, &format!("servers/{server_id}/user_data")))
            .await?;
        Ok(envelope.user_data)
    }

    /// Set one user data key of a server. The body is raw text, not JSON.
    pub async fn set_server_user_data(
        &self,
        zone: &Zone,
        server_id: &str,
        key: &str,
        content: &str,
    ) -> Result<(), ScalewayError> {
        let url = format!(
            "{}{}",
            self.base_url,
            Self::instance_path(zone, &format!("servers/{server_id}/user_data/{key}"))
        );
        debug!("PATCH {}", url);

        let response = self
            .client
            .patch(&url)
            .header("X-Auth-Token", &self.secret_key)
            .header("Content-Type", "text/plain")
            .body(content.to_string())
            .send()
            .await
            .map_err(ScalewayError::Http)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }
        Ok(())
    }

    /// List instance flexible IPs, optionally filtered by tags.
    pub async fn list_instance_ips(
        &self,
        zone: &Zone,
        tags: &[String],
    ) -> Result<Vec<InstanceIp>, ScalewayError> {
        let mut params = vec![("project", self.project_id.clone())];
        if !tags.is_empty() {
            params.push(("tags", tags.join(",")));
        }
        self.list_all(&Self::instance_path(zone, "ips"), &params, |p: InstanceIpsPage| {
            p.ips
        })
        .await
    }

    /// Reserve an instance flexible IPv4.
    pub async fn create_instance_ip(
        &self,
        zone: &Zone,
        tags: &[String],
    ) -> Result<InstanceIp, ScalewayError> {
        let envelope: IpEnvelope<InstanceIp> = self
            .post_json(
                &Self::instance_path(zone, "ips"),
                json!({ "project": self.project_id, "tags": tags }),
            )
            .await?;
        Ok(envelope.ip)
    }

    /// Release an instance flexible IP.
    pub async fn delete_instance_ip(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_path(&Self::instance_path(zone, &format!("ips/{id}"))).await
    }

    /// List the private NICs of a server.
    pub async fn list_private_nics(
        &self,
        zone: &Zone,
        server_id: &str,
    ) -> Result<Vec<PrivateNic>, ScalewayError> {
        self.list_all(
            &Self::instance_path(zone, &format!("servers/{server_id}/private_nics")),
            &[],
            |p: PrivateNicsPage| p.private_nics,
        )
        .await
    }

    /// Attach a server to a private network.
    pub async fn create_private_nic(
        &self,
        zone: &Zone,
        server_id: &str,
        private_network_id: &str,
    ) -> Result<PrivateNic, ScalewayError> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            private_nic: PrivateNic,
        }
        let envelope: Envelope = self
            .post_json(
                &Self::instance_path(zone, &format!("servers/{server_id}/private_nics")),
                json!({ "private_network_id": private_network_id }),
            )
            .await?;
        Ok(envelope.private_nic)
    }

    /// Detach the volume in the given slot from a server.
    ///
    /// The instance API has no detach endpoint, the server's volume map is
    /// patched without the slot instead.
    pub async fn detach_volume(
        &self,
        zone: &Zone,
        server_id: &str,
        slot: &str,
    ) -> Result<(), ScalewayError> {
        let server = self.get_server(zone, server_id).await?;
        let remaining: serde_json::Map<String, serde_json::Value> = server
            .volumes
            .iter()
            .filter(|(s, _)| s.as_str() != slot)
            .map(|(s, v)| (s.clone(), json!({ "id": v.id, "boot": v.boot })))
            .collect();
        let _: ServerEnvelope = self
            .patch_json(
                &Self::instance_path(zone, &format!("servers/{server_id}")),
                json!({ "volumes": remaining }),
            )
            .await?;
        Ok(())
    }

    /// Delete a detached volume.
    pub async fn delete_volume(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_path(&Self::instance_path(zone, &format!("volumes/{id}")))
            .await
    }

    // ------------------------------------------------------------------
    // Security groups

    /// List security groups in a zone, optionally filtered by name and tags.
    pub async fn list_security_groups(
        &self,
        zone: &Zone,
        name: Option<&str>,
        tags: &[String],
    ) -> Result<Vec<SecurityGroup>, ScalewayError> {
        let mut params = vec![("project", self.project_id.clone())];
        if let Some(name) = name {
            params.push(("name", name.to_string()));
        }
        if !tags.is_empty() {
            params.push(("tags", tags.join(",")));
        }
        self.list_all(
            &Self::instance_path(zone, "security_groups"),
            &params,
            |p: SecurityGroupsPage| p.security_groups,
        )
        .await
    }

    /// Create a security group.
    pub async fn create_security_group(
        &self,
        zone: &Zone,
        request: &CreateSecurityGroupRequest,
    ) -> Result<SecurityGroup, ScalewayError> {
        let envelope: SecurityGroupEnvelope = self
            .post_json(
                &Self::instance_path(zone, "security_groups"),
                json!({
                    "name": request.name,
                    "project": self.project_id,
                    "tags": request.tags,
                    "inbound_default_policy": request.inbound_default_policy,
                    "outbound_default_policy": request.outbound_default_policy,
                    "enable_default_security": request.enable_default_security,
                    "stateful": request.stateful,
                }),
            )
            .await?;
        Ok(envelope.security_group)
    }

    /// Update the default policies of a security group.
    pub async fn update_security_group(
        &self,
        zone: &Zone,
        id: &str,
        inbound_default_policy: SecurityGroupPolicy,
        outbound_default_policy: SecurityGroupPolicy,
        stateful: bool,
    ) -> Result<SecurityGroup, ScalewayError> {
        let envelope: SecurityGroupEnvelope = self
            .patch_json(
                &Self::instance_path(zone, &format!("security_groups/{id}")),
                json!({
                    "inbound_default_policy": inbound_default_policy,
                    "outbound_default_policy": outbound_default_policy,
                    "stateful": stateful,
                }),
            )
            .await?;
        Ok(envelope.security_group)
    }

    /// Delete a security group.
    pub async fn delete_security_group(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_path(&Self::instance_path(zone, &format!("security_groups/{id}")))
            .await
    }

    /// List the rules of a security group.
    pub async fn list_security_group_rules(
        &self,
        zone: &Zone,
        security_group_id: &str,
    ) -> Result<Vec<SecurityGroupRule>, ScalewayError> {
        self.list_all(
            &Self::instance_path(zone, &format!("security_groups/{security_group_id}/rules")),
            &[],
            |p: SecurityGroupRulesPage| p.rules,
        )
        .await
    }

    /// Atomically replace the whole rule set of a security group.
    pub async fn set_security_group_rules(
        &self,
        zone: &Zone,
        security_group_id: &str,
        rules: &[SetSecurityGroupRule],
    ) -> Result<(), ScalewayError> {
        self.put_unit(
            &Self::instance_path(zone, &format!("security_groups/{security_group_id}/rules")),
            json!({ "rules": rules }),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Marketplace and IPAM

    /// Resolve a marketplace image label to the UUID of the local image
    /// compatible with the given commercial type in the given zone.
    pub async fn get_local_image_id_by_label(
        &self,
        zone: &Zone,
        commercial_type: &str,
        label: &str,
    ) -> Result<String, ScalewayError> {
        let query = Self::query_string(&[
            ("image_label", label.to_string()),
            ("commercial_type", commercial_type.to_string()),
            ("zone", zone.to_string()),
            ("type", "instance_local".to_string()),
        ]);
        let page: LocalImagesPage = self
            .get_json(&format!("/marketplace/v2/local-images?{query}"))
            .await?;
        page.local_images
            .into_iter()
            .next()
            .map(|image| image.id)
            .ok_or(ScalewayError::NoItemFound)
    }

    /// List addresses attached to a resource known to IPAM.
    pub async fn list_ipam_ips(
        &self,
        region: &Region,
        resource_id: &str,
        resource_type: &str,
        is_ipv6: bool,
    ) -> Result<Vec<IpamIp>, ScalewayError> {
        let params = vec![
            ("project_id", self.project_id.clone()),
            ("resource_id", resource_id.to_string()),
            ("resource_type", resource_type.to_string()),
            ("is_ipv6", is_ipv6.to_string()),
        ];
        self.list_all(
            &format!("/ipam/v1/regions/{region}/ips"),
            &params,
            |p: IpamIpsPage| p.ips,
        )
        .await
    }
}

#[async_trait::async_trait]
impl ScalewayClientTrait for ScalewayClient {
    fn project_id(&self) -> &str {
        self.project_id()
    }

    // VPC operations
    async fn list_private_networks(&self, region: &Region, name: Option<&str>) -> Result<Vec<PrivateNetwork>, ScalewayError> {
        self.list_private_networks(region, name).await
    }

    async fn create_private_network(&self, region: &Region, name: &str, subnets: &[String], tags: &[String]) -> Result<PrivateNetwork, ScalewayError> {
        self.create_private_network(region, name, subnets, tags).await
    }

    async fn get_private_network(&self, region: &Region, id: &str) -> Result<PrivateNetwork, ScalewayError> {
        self.get_private_network(region, id).await
    }

    async fn delete_private_network(&self, region: &Region, id: &str) -> Result<(), ScalewayError> {
        self.delete_private_network(region, id).await
    }

    // Public gateway operations
    async fn list_gateways(&self, zone: &Zone, name: Option<&str>) -> Result<Vec<Gateway>, ScalewayError> {
        self.list_gateways(zone, name).await
    }

    async fn create_gateway(&self, zone: &Zone, name: &str, gateway_type: &str, ip_id: Option<&str>, tags: &[String]) -> Result<Gateway, ScalewayError> {
        self.create_gateway(zone, name, gateway_type, ip_id, tags).await
    }

    async fn delete_gateway(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_gateway(zone, id).await
    }

    async fn list_gateway_ips(&self, zone: &Zone, tags: &[String]) -> Result<Vec<GatewayIp>, ScalewayError> {
        self.list_gateway_ips(zone, tags).await
    }

    async fn create_gateway_ip(&self, zone: &Zone, tags: &[String]) -> Result<GatewayIp, ScalewayError> {
        self.create_gateway_ip(zone, tags).await
    }

    async fn delete_gateway_ip(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_gateway_ip(zone, id).await
    }

    async fn list_gateway_networks(&self, zone: &Zone, gateway_id: Option<&str>, private_network_id: Option<&str>) -> Result<Vec<GatewayNetwork>, ScalewayError> {
        self.list_gateway_networks(zone, gateway_id, private_network_id).await
    }

    async fn create_gateway_network(&self, zone: &Zone, gateway_id: &str, private_network_id: &str, enable_dhcp: bool, enable_masquerade: bool, push_default_route: bool) -> Result<GatewayNetwork, ScalewayError> {
        self.create_gateway_network(zone, gateway_id, private_network_id, enable_dhcp, enable_masquerade, push_default_route).await
    }

    async fn delete_gateway_network(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_gateway_network(zone, id).await
    }

    // Load balancer operations
    async fn list_lbs(&self, zone: &Zone, name: Option<&str>) -> Result<Vec<Lb>, ScalewayError> {
        self.list_lbs(zone, name).await
    }

    async fn create_lb(&self, zone: &Zone, name: &str, lb_type: &str, ip_id: Option<&str>, tags: &[String]) -> Result<Lb, ScalewayError> {
        self.create_lb(zone, name, lb_type, ip_id, tags).await
    }

    async fn delete_lb(&self, zone: &Zone, id: &str, release_ip: bool) -> Result<(), ScalewayError> {
        self.delete_lb(zone, id, release_ip).await
    }

    async fn list_lb_ips(&self, zone: &Zone, ip_address: Option<&str>) -> Result<Vec<LbIp>, ScalewayError> {
        self.list_lb_ips(zone, ip_address).await
    }

    async fn list_backends(&self, zone: &Zone, lb_id: &str, name: Option<&str>) -> Result<Vec<Backend>, ScalewayError> {
        self.list_backends(zone, lb_id, name).await
    }

    async fn create_backend(&self, zone: &Zone, lb_id: &str, name: &str, forward_port: u32, health_check: &HealthCheck) -> Result<Backend, ScalewayError> {
        self.create_backend(zone, lb_id, name, forward_port, health_check).await
    }

    async fn delete_backend(&self, zone: &Zone, backend_id: &str) -> Result<(), ScalewayError> {
        self.delete_backend(zone, backend_id).await
    }

    async fn add_backend_servers(&self, zone: &Zone, backend_id: &str, server_ips: &[String]) -> Result<(), ScalewayError> {
        self.add_backend_servers(zone, backend_id, server_ips).await
    }

    async fn remove_backend_servers(&self, zone: &Zone, backend_id: &str, server_ips: &[String]) -> Result<(), ScalewayError> {
        self.remove_backend_servers(zone, backend_id, server_ips).await
    }

    async fn list_frontends(&self, zone: &Zone, lb_id: &str, name: Option<&str>) -> Result<Vec<Frontend>, ScalewayError> {
        self.list_frontends(zone, lb_id, name).await
    }

    async fn create_frontend(&self, zone: &Zone, lb_id: &str, name: &str, inbound_port: u32, backend_id: &str) -> Result<Frontend, ScalewayError> {
        self.create_frontend(zone, lb_id, name, inbound_port, backend_id).await
    }

    async fn delete_frontend(&self, zone: &Zone, frontend_id: &str) -> Result<(), ScalewayError> {
        self.delete_frontend(zone, frontend_id).await
    }

    async fn list_acls(&self, zone: &Zone, frontend_id: &str, name: Option<&str>) -> Result<Vec<Acl>, ScalewayError> {
        self.list_acls(zone, frontend_id, name).await
    }

    async fn create_acl(&self, zone: &Zone, frontend_id: &str, name: &str, index: i32, action_type: AclActionType, ip_subnets: &[String]) -> Result<Acl, ScalewayError> {
        self.create_acl(zone, frontend_id, name, index, action_type, ip_subnets).await
    }

    async fn update_acl(&self, zone: &Zone, acl_id: &str, name: &str, index: i32, action_type: AclActionType, ip_subnets: &[String]) -> Result<Acl, ScalewayError> {
        self.update_acl(zone, acl_id, name, index, action_type, ip_subnets).await
    }

    async fn delete_acl(&self, zone: &Zone, acl_id: &str) -> Result<(), ScalewayError> {
        self.delete_acl(zone, acl_id).await
    }

    async fn list_lb_private_networks(&self, zone: &Zone, lb_id: &str) -> Result<Vec<LbPrivateNetwork>, ScalewayError> {
        self.list_lb_private_networks(zone, lb_id).await
    }

    async fn attach_lb_private_network(&self, zone: &Zone, lb_id: &str, private_network_id: &str) -> Result<(), ScalewayError> {
        self.attach_lb_private_network(zone, lb_id, private_network_id).await
    }

    // Instance operations
    async fn list_servers(&self, zone: &Zone, name: Option<&str>, tags: &[String]) -> Result<Vec<Server>, ScalewayError> {
        self.list_servers(zone, name, tags).await
    }

    async fn create_server(&self, zone: &Zone, request: &CreateServerRequest) -> Result<Server, ScalewayError> {
        self.create_server(zone, request).await
    }

    async fn get_server(&self, zone: &Zone, id: &str) -> Result<Server, ScalewayError> {
        self.get_server(zone, id).await
    }

    async fn delete_server(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_server(zone, id).await
    }

    async fn server_action(&self, zone: &Zone, id: &str, action: ServerAction) -> Result<(), ScalewayError> {
        self.server_action(zone, id, action).await
    }

    async fn list_server_user_data(&self, zone: &Zone, server_id: &str) -> Result<Vec<String>, ScalewayError> {
        self.list_server_user_data(zone, server_id).await
    }

    async fn set_server_user_data(&self, zone: &Zone, server_id: &str, key: &str, content: &str) -> Result<(), ScalewayError> {
        self.set_server_user_data(zone, server_id, key, content).await
    }

    async fn list_instance_ips(&self, zone: &Zone, tags: &[String]) -> Result<Vec<InstanceIp>, ScalewayError> {
        self.list_instance_ips(zone, tags).await
    }

    async fn create_instance_ip(&self, zone: &Zone, tags: &[String]) -> Result<InstanceIp, ScalewayError> {
        self.create_instance_ip(zone, tags).await
    }

    async fn delete_instance_ip(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_instance_ip(zone, id).await
    }

    async fn list_private_nics(&self, zone: &Zone, server_id: &str) -> Result<Vec<PrivateNic>, ScalewayError> {
        self.list_private_nics(zone, server_id).await
    }

    async fn create_private_nic(&self, zone: &Zone, server_id: &str, private_network_id: &str) -> Result<PrivateNic, ScalewayError> {
        self.create_private_nic(zone, server_id, private_network_id).await
    }

    async fn detach_volume(&self, zone: &Zone, server_id: &str, slot: &str) -> Result<(), ScalewayError> {
        self.detach_volume(zone, server_id, slot).await
    }

    async fn delete_volume(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_volume(zone, id).await
    }

    // Security group operations
    async fn list_security_groups(&self, zone: &Zone, name: Option<&str>, tags: &[String]) -> Result<Vec<SecurityGroup>, ScalewayError> {
        self.list_security_groups(zone, name, tags).await
    }

    async fn create_security_group(&self, zone: &Zone, request: &CreateSecurityGroupRequest) -> Result<SecurityGroup, ScalewayError> {
        self.create_security_group(zone, request).await
    }

    async fn update_security_group(&self, zone: &Zone, id: &str, inbound_default_policy: SecurityGroupPolicy, outbound_default_policy: SecurityGroupPolicy, stateful: bool) -> Result<SecurityGroup, ScalewayError> {
        self.update_security_group(zone, id, inbound_default_policy, outbound_default_policy, stateful).await
    }

    async fn delete_security_group(&self, zone: &Zone, id: &str) -> Result<(), ScalewayError> {
        self.delete_security_group(zone, id).await
    }

    async fn list_security_group_rules(&self, zone: &Zone, security_group_id: &str) -> Result<Vec<SecurityGroupRule>, ScalewayError> {
        self.list_security_group_rules(zone, security_group_id).await
    }

    async fn set_security_group_rules(&self, zone: &Zone, security_group_id: &str, rules: &[SetSecurityGroupRule]) -> Result<(), ScalewayError> {
        self.set_security_group_rules(zone, security_group_id, rules).await
    }

    // Marketplace operations
    async fn get_local_image_id_by_label(&self, zone: &Zone, commercial_type: &str, label: &str) -> Result<String, ScalewayError> {
        self.get_local_image_id_by_label(zone, commercial_type, label).await
    }

    // IPAM operations
    async fn list_ipam_ips(&self, region: &Region, resource_id: &str, resource_type: &str, is_ipv6: bool) -> Result<Vec<IpamIp>, ScalewayError> {
        self.list_ipam_ips(region, resource_id, resource_type, is_ipv6).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_encodes_values() {
        let query = ScalewayClient::query_string(&[
            ("name", "caps-my cluster".to_string()),
            ("tags", "caps-cluster=demo".to_string()),
        ]);
        assert_eq!(query, "name=caps-my%20cluster&tags=caps-cluster%3Ddemo");
    }

    #[test]
    fn new_rejects_empty_credentials() {
        let result = ScalewayClient::new(
            "SCWXXX".to_string(),
            String::new(),
            "project".to_string(),
            None,
        );
        assert!(matches!(result, Err(ScalewayError::InvalidRequest(_))));

        let result = ScalewayClient::new(
            "SCWXXX".to_string(),
            "secret".to_string(),
            String::new(),
            None,
        );
        assert!(matches!(result, Err(ScalewayError::InvalidRequest(_))));
    }

    #[test]
    fn debug_output_redacts_the_secret_key() {
        let client = ScalewayClient::new(
            "SCWXXX".to_string(),
            "11111111-1111-1111-1111-111111111111".to_string(),
            "project".to_string(),
            None,
        )
        .unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("11111111-1111-1111-1111-111111111111"));
        assert!(rendered.contains("SCWXXX"));
    }

    #[test]
    fn zoned_paths() {
        let zone = Zone::from("fr-par-1");
        assert_eq!(
            ScalewayClient::instance_path(&zone, "servers"),
            "/instance/v1/zones/fr-par-1/servers"
        );
        assert_eq!(
            ScalewayClient::lb_path(&zone, "lbs/abc/backends"),
            "/lb/v1/zones/fr-par-1/lbs/abc/backends"
        );
    }
}
