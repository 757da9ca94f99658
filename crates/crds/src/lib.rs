//! Cluster API provider CRD definitions
//!
//! Kubernetes Custom Resource Definitions for the Scaleway infrastructure
//! provider: ScalewayCluster and ScalewayMachine.

pub mod scaleway_cluster;
pub mod scaleway_machine;
pub mod security_group;

pub use scaleway_cluster::*;
pub use scaleway_machine::*;
pub use security_group::*;
