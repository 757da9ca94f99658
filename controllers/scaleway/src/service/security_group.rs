//! Security group reconciliation.
//!
//! Every group declared in the ScalewayCluster spec is replicated in each
//! target zone of the region under the name `<cluster>-<group>`. Groups
//! carrying the cluster tag but no longer declared are pruned.
//!
//! Rules are compared positionally against the provider state: inbound rules
//! take positions 1..n, outbound rules continue the sequence. On any
//! difference the whole rule set is replaced in one call, never patched rule
//! by rule.

use crate::error::ControllerError;
use crate::scope::ClusterScope;
use crds::SecurityGroupAction;
use scaleway_client::{
    CreateSecurityGroupRequest, RuleDirection, ScalewayError, SecurityGroupRule,
    SetSecurityGroupRule, Zone,
};
use std::collections::HashSet;
use tracing::info;

const DEFAULT_IP_RANGE: &str = "0.0.0.0/0";

pub async fn reconcile(scope: &ClusterScope) -> Result<(), ControllerError> {
    let desired = scope.security_groups();
    let zones = scope.zones();

    for zone in &zones {
        for group in &desired {
            reconcile_group(scope, zone, group).await?;
        }
        prune_undesired(scope, zone, &desired).await?;
    }
    Ok(())
}

async fn reconcile_group(
    scope: &ClusterScope,
    zone: &Zone,
    group: &crds::SecurityGroup,
) -> Result<(), ControllerError> {
    let name = scope.security_group_name(&group.name);
    let inbound_policy =
        SecurityGroupAction::to_policy(group.inbound.as_ref().and_then(|p| p.default));
    let outbound_policy =
        SecurityGroupAction::to_policy(group.outbound.as_ref().and_then(|p| p.default));

    let existing = match scope.client.find_security_group_by_name(zone, &name).await {
        Ok(sg) => {
            if sg.inbound_default_policy != inbound_policy
                || sg.outbound_default_policy != outbound_policy
                || !sg.stateful
            {
                info!(cluster = scope.name(), %zone, group = %name, "Updating security group policies");
                scope
                    .client
                    .update_security_group(zone, &sg.id, inbound_policy, outbound_policy, true)
                    .await?
            } else {
                sg
            }
        }
        Err(ScalewayError::NoItemFound) => {
            info!(cluster = scope.name(), %zone, group = %name, "Creating security group");
            scope
                .client
                .create_security_group(
                    zone,
                    &CreateSecurityGroupRequest {
                        name: name.clone(),
                        tags: scope.tags(),
                        inbound_default_policy: inbound_policy,
                        outbound_default_policy: outbound_policy,
                        enable_default_security: false,
                        stateful: true,
                    },
                )
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    let desired_rules = desired_rules(group)?;
    let current = scope
        .client
        .list_security_group_rules(zone, &existing.id)
        .await?;
    if !rules_match(&current, &desired_rules) {
        info!(cluster = scope.name(), %zone, group = %name, "Replacing security group rules");
        scope
            .client
            .set_security_group_rules(zone, &existing.id, &desired_rules)
            .await?;
    }
    Ok(())
}

/// Flatten the declared policies into one positional rule set.
fn desired_rules(group: &crds::SecurityGroup) -> Result<Vec<SetSecurityGroupRule>, ControllerError> {
    let mut rules = Vec::new();
    let mut position = 1u32;

    let directions = [
        (RuleDirection::Inbound, group.inbound.as_ref()),
        (RuleDirection::Outbound, group.outbound.as_ref()),
    ];
    for (direction, policy) in directions {
        let Some(policy) = policy else { continue };
        for rule in &policy.rules {
            let (dest_port_from, dest_port_to) = match &rule.ports {
                Some(ports) => ports.to_range()?,
                None => (None, None),
            };
            rules.push(SetSecurityGroupRule {
                direction,
                action: SecurityGroupAction::to_rule_action(Some(rule.action)),
                protocol: crds::SecurityGroupProtocol::to_rule_protocol(rule.protocol),
                ip_range: rule
                    .ip_range
                    .clone()
                    .unwrap_or_else(|| DEFAULT_IP_RANGE.to_string()),
                dest_port_from,
                dest_port_to,
                position,
            });
            position += 1;
        }
    }
    Ok(rules)
}

/// Positional comparison of the provider state against the desired set.
fn rules_match(current: &[SecurityGroupRule], desired: &[SetSecurityGroupRule]) -> bool {
    if current.len() != desired.len() {
        return false;
    }
    let mut current: Vec<&SecurityGroupRule> = current.iter().collect();
    current.sort_by_key(|r| r.position);
    current.iter().zip(desired).all(|(c, d)| {
        c.position == d.position
            && c.direction == d.direction
            && c.action == d.action
            && c.protocol == d.protocol
            && c.ip_range == d.ip_range
            && c.dest_port_from == d.dest_port_from
            && c.dest_port_to == d.dest_port_to
    })
}

/// Delete groups tagged for this cluster that the spec no longer declares.
async fn prune_undesired(
    scope: &ClusterScope,
    zone: &Zone,
    desired: &[crds::SecurityGroup],
) -> Result<(), ControllerError> {
    let desired_names: HashSet<String> = desired
        .iter()
        .map(|g| scope.security_group_name(&g.name))
        .collect();
    let owned = scope
        .client
        .list_security_groups(zone, None, &scope.tags())
        .await?;
    for sg in owned {
        if !desired_names.contains(&sg.name) {
            info!(cluster = scope.name(), %zone, group = %sg.name, "Pruning security group");
            scope.client.delete_security_group(zone, &sg.id).await?;
        }
    }
    Ok(())
}

/// Delete every security group owned by the cluster.
pub async fn delete(scope: &ClusterScope) -> Result<(), ControllerError> {
    for zone in scope.zones() {
        prune_undesired(scope, &zone, &[]).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use scaleway_client::{MockScalewayClient, RuleAction, RuleProtocol, ScalewayClientTrait};
    use std::sync::Arc;

    fn scope_with_groups(
        groups: Vec<crds::SecurityGroup>,
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
                // Single zone keeps the mutation logs small.
                failure_domains: Some(vec!["fr-par-1".to_string()]),
                region: "fr-par".to_string(),
                network: Some(crds::NetworkSpec {
                    private_network: None,
                    public_gateway: None,
                    security_groups: groups,
                }),
                control_plane_load_balancer: None,
                scaleway_secret_name: "scaleway-secret".to_string(),
            },
            status: None,
        };
        (ClusterScope::new(cluster, client.clone()), client)
    }

    fn node_group() -> crds::SecurityGroup {
        crds::SecurityGroup {
            name: "node".to_string(),
            inbound: Some(crds::SecurityGroupPolicy {
                default: Some(SecurityGroupAction::Drop),
                rules: vec![
                    crds::SecurityGroupRule {
                        action: SecurityGroupAction::Accept,
                        protocol: Some(crds::SecurityGroupProtocol::Tcp),
                        ports: Some(crds::PortOrPortRange("22".to_string())),
                        ip_range: None,
                    },
                    crds::SecurityGroupRule {
                        action: SecurityGroupAction::Accept,
                        protocol: Some(crds::SecurityGroupProtocol::Tcp),
                        ports: Some(crds::PortOrPortRange("30000-32767".to_string())),
                        ip_range: Some("10.0.0.0/22".to_string()),
                    },
                ],
            }),
            outbound: Some(crds::SecurityGroupPolicy {
                default: None,
                rules: vec![crds::SecurityGroupRule {
                    action: SecurityGroupAction::Drop,
                    protocol: Some(crds::SecurityGroupProtocol::Udp),
                    ports: Some(crds::PortOrPortRange("25".to_string())),
                    ip_range: None,
                }],
            }),
        }
    }

    #[test]
    fn positions_are_contiguous_across_directions() {
        let rules = desired_rules(&node_group()).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].position, 1);
        assert_eq!(rules[0].direction, RuleDirection::Inbound);
        assert_eq!(rules[0].dest_port_from, Some(22));
        assert_eq!(rules[0].dest_port_to, None);
        assert_eq!(rules[0].ip_range, "0.0.0.0/0");
        assert_eq!(rules[1].position, 2);
        assert_eq!(rules[1].dest_port_from, Some(30000));
        assert_eq!(rules[1].dest_port_to, Some(32767));
        assert_eq!(rules[2].position, 3);
        assert_eq!(rules[2].direction, RuleDirection::Outbound);
        assert_eq!(rules[2].action, RuleAction::Drop);
        assert_eq!(rules[2].protocol, RuleProtocol::Udp);
    }

    #[tokio::test]
    async fn converges_then_stays_quiet() {
        let (scope, client) = scope_with_groups(vec![node_group()]);

        reconcile(&scope).await.unwrap();
        assert_eq!(
            client.mutation_log(),
            vec![
                "create_security_group caps-demo-node fr-par-1",
                "set_security_group_rules sg-1 (3 rules)",
            ]
        );
        let rules = client.security_group_rules("sg-1");
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[2].position, 3);

        client.clear_mutation_log();
        reconcile(&scope).await.unwrap();
        assert!(client.mutation_log().is_empty());
    }

    #[tokio::test]
    async fn rule_drift_triggers_full_replacement() {
        let (scope, client) = scope_with_groups(vec![node_group()]);
        reconcile(&scope).await.unwrap();

        // Drop one rule behind the controller's back.
        let mut rules: Vec<SetSecurityGroupRule> = desired_rules(&node_group()).unwrap();
        rules.pop();
        client
            .set_security_group_rules(&Zone::from("fr-par-1"), "sg-1", &rules)
            .await
            .unwrap();

        client.clear_mutation_log();
        reconcile(&scope).await.unwrap();
        assert_eq!(
            client.mutation_log(),
            vec!["set_security_group_rules sg-1 (3 rules)"]
        );
    }

    #[tokio::test]
    async fn undeclared_groups_are_pruned() {
        let (scope, client) = scope_with_groups(vec![node_group()]);
        reconcile(&scope).await.unwrap();

        // Same cluster, group removed from the spec.
        let (scope, _) = {
            let (mut s, _c) = scope_with_groups(vec![]);
            s.client = client.clone();
            (s, ())
        };
        client.clear_mutation_log();
        reconcile(&scope).await.unwrap();
        assert_eq!(client.mutation_log(), vec!["delete_security_group sg-1"]);
    }

    #[tokio::test]
    async fn delete_removes_all_owned_groups() {
        let (scope, client) = scope_with_groups(vec![node_group()]);
        reconcile(&scope).await.unwrap();

        client.clear_mutation_log();
        delete(&scope).await.unwrap();
        assert_eq!(client.mutation_log(), vec!["delete_security_group sg-1"]);
    }
}
