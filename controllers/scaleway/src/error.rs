//! Controller-specific error types.
//!
//! This module defines error types specific to the Scaleway infrastructure
//! controller that are not covered by upstream library errors.

use scaleway_client::ScalewayError;
use std::fmt;
use thiserror::Error;

/// A resource the reconciliation depends on is not ready yet.
///
/// Not an error condition: the reconciler translates this into a short
/// requeue and tries again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    /// The control-plane load balancer is still provisioning.
    LoadBalancer,
    /// The instance has no private IP assigned by DHCP yet.
    PrivateIp,
    /// The bootstrap payload secret does not exist yet.
    BootstrapData,
    /// The instance has not reached the stopped state yet.
    InstanceNotStopped,
    /// The owner cluster has not finished reconciling its network.
    OwnerClusterNotReady,
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::LoadBalancer => "load balancer is not ready",
            Self::PrivateIp => "instance has no private IP yet",
            Self::BootstrapData => "bootstrap data is not available yet",
            Self::InstanceNotStopped => "instance is not stopped yet",
            Self::OwnerClusterNotReady => "owner cluster is not ready",
        };
        f.write_str(reason)
    }
}

/// Errors that can occur in the Scaleway infrastructure controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Scaleway API error
    #[error("Scaleway error: {0}")]
    Scaleway(#[from] ScalewayError),

    /// Malformed security group rule in a ScalewayCluster spec
    #[error("Invalid security group rule: {0}")]
    Rule(#[from] crds::RuleError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required key is missing from a secret
    #[error("Secret {secret} is missing key {key}")]
    MissingSecretKey {
        /// Name of the secret
        secret: String,
        /// Missing key
        key: String,
    },

    /// The instance is locked by the provider and cannot be reconciled
    #[error("Instance {0} is locked, manual intervention required")]
    InstanceLocked(String),

    /// A dependency is not ready, reconciliation will be retried shortly
    #[error("Not ready: {0}")]
    NotReady(NotReadyReason),

    /// A watcher task exited
    #[error("Watch error: {0}")]
    Watch(String),
}
