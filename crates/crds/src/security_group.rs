//! Security group types shared by the ScalewayCluster CRD.
//!
//! A security group declared here is replicated in every target zone of the
//! cluster region. Rules are ordered: their position in the list is the
//! position sent to the provider.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named security group with inbound/outbound policies.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    /// Name of the security group. Must be unique in a list of security groups.
    pub name: String,

    /// Inbound policy. If not set, all inbound traffic is allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<SecurityGroupPolicy>,

    /// Outbound policy. If not set, all outbound traffic is allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<SecurityGroupPolicy>,
}

/// Policy for inbound or outbound traffic.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupPolicy {
    /// Default policy. If unset, defaults to Accept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<SecurityGroupAction>,

    /// Ordered list of rules for this policy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<SecurityGroupRule>,
}

/// A rule of a security group policy.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupRule {
    /// Action to apply when the rule matches a packet.
    pub action: SecurityGroupAction,

    /// Protocol family this rule applies to. If unset, defaults to ANY.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<SecurityGroupProtocol>,

    /// Port or range of ports this rule applies to. Not applicable for ICMP
    /// or ANY.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<PortOrPortRange>,

    /// IP range this rule applies to. Defaults to 0.0.0.0/0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_range: Option<String>,
}

/// Error returned for malformed rule fields.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    /// A port is not a number.
    #[error("port {0:?} is not a valid number")]
    InvalidPort(String),
    /// Lower bound of a range is higher than the upper bound.
    #[error("invalid port range: 'from' is higher than 'to'")]
    ReversedRange,
    /// More than one dash in a port range.
    #[error("port or port range is not correctly formatted")]
    MalformedRange,
}

/// String representation of a port or an inclusive port range (e.g. 0-1024).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PortOrPortRange(pub String);

impl PortOrPortRange {
    /// Parses the port or port range. The first value is the lower port
    /// ("from"), the second the higher port ("to"). A single port yields no
    /// upper bound.
    pub fn to_range(&self) -> Result<(Option<u32>, Option<u32>), RuleError> {
        let parts: Vec<&str> = self.0.split('-').collect();

        let parse = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| RuleError::InvalidPort(s.to_string()))
        };

        match parts.as_slice() {
            [port] => Ok((Some(parse(port)?), None)),
            [from, to] => {
                let from = parse(from)?;
                let to = parse(to)?;
                if to < from {
                    return Err(RuleError::ReversedRange);
                }
                Ok((Some(from), Some(to)))
            }
            _ => Err(RuleError::MalformedRange),
        }
    }
}

/// Action applied when a packet matches a rule, also used as default policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum SecurityGroupAction {
    /// Accept all matching packets.
    Accept,
    /// Drop all matching packets.
    Drop,
}

impl SecurityGroupAction {
    /// Provider default policy for this action. `None` means Accept.
    pub fn to_policy(this: Option<Self>) -> scaleway_client::SecurityGroupPolicy {
        match this {
            None | Some(Self::Accept) => scaleway_client::SecurityGroupPolicy::Accept,
            Some(Self::Drop) => scaleway_client::SecurityGroupPolicy::Drop,
        }
    }

    /// Provider rule action for this action. `None` means Accept.
    pub fn to_rule_action(this: Option<Self>) -> scaleway_client::RuleAction {
        match this {
            None | Some(Self::Accept) => scaleway_client::RuleAction::Accept,
            Some(Self::Drop) => scaleway_client::RuleAction::Drop,
        }
    }
}

/// Network protocol matched by a rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityGroupProtocol {
    /// Matches a packet of any protocol.
    Any,
    /// Matches a TCP packet.
    Tcp,
    /// Matches an UDP packet.
    Udp,
    /// Matches an ICMP packet.
    Icmp,
}

impl SecurityGroupProtocol {
    /// Provider rule protocol for this protocol. `None` means ANY.
    pub fn to_rule_protocol(this: Option<Self>) -> scaleway_client::RuleProtocol {
        match this {
            None | Some(Self::Any) => scaleway_client::RuleProtocol::Any,
            Some(Self::Tcp) => scaleway_client::RuleProtocol::Tcp,
            Some(Self::Udp) => scaleway_client::RuleProtocol::Udp,
            Some(Self::Icmp) => scaleway_client::RuleProtocol::Icmp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_port_has_no_upper_bound() {
        assert_eq!(
            PortOrPortRange("80".to_string()).to_range(),
            Ok((Some(80), None))
        );
    }

    #[test]
    fn range_is_inclusive_pair() {
        assert_eq!(
            PortOrPortRange("80-443".to_string()).to_range(),
            Ok((Some(80), Some(443)))
        );
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert_eq!(
            PortOrPortRange("443-80".to_string()).to_range(),
            Err(RuleError::ReversedRange)
        );
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        assert!(matches!(
            PortOrPortRange("abc".to_string()).to_range(),
            Err(RuleError::InvalidPort(_))
        ));
    }

    #[test]
    fn extra_dash_is_rejected() {
        assert_eq!(
            PortOrPortRange("80-443-1".to_string()).to_range(),
            Err(RuleError::MalformedRange)
        );
    }

    #[test]
    fn default_action_maps_to_accept() {
        assert_eq!(
            SecurityGroupAction::to_policy(None),
            scaleway_client::SecurityGroupPolicy::Accept
        );
        assert_eq!(
            SecurityGroupAction::to_rule_action(Some(SecurityGroupAction::Drop)),
            scaleway_client::RuleAction::Drop
        );
    }

    #[test]
    fn default_protocol_maps_to_any() {
        assert_eq!(
            SecurityGroupProtocol::to_rule_protocol(None),
            scaleway_client::RuleProtocol::Any
        );
        assert_eq!(
            SecurityGroupProtocol::to_rule_protocol(Some(SecurityGroupProtocol::Icmp)),
            scaleway_client::RuleProtocol::Icmp
        );
    }
}
