//! Reconciliation logic for the Scaleway infrastructure CRDs.
//!
//! This module is organized by resource kind:
//! - `cluster`: ScalewayCluster (private network, public gateway, load
//!   balancer, security groups)
//! - `machine`: ScalewayMachine (compute instance and its attachments)
//!
//! All Kubernetes API traffic happens here. The services under
//! `crate::service` only ever see a scope and a Scaleway client.

pub mod cluster;
pub mod machine;

use crate::error::ControllerError;
use crate::secret::scaleway_client_from_secret;
use crds::{ScalewayCluster, ScalewayMachine};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::{Api, Resource, ResourceExt};
use scaleway_client::ScalewayClientTrait;
use std::sync::Arc;
use tracing::debug;

/// Requeue interval while a dependency is not ready yet.
pub(crate) const NOT_READY_REQUEUE_SECS: u64 = 2;

/// Requeue interval while cloud resources are still draining on delete.
pub(crate) const DRAIN_REQUEUE_SECS: u64 = 5;

/// Reconciles ScalewayCluster and ScalewayMachine resources.
pub struct Reconciler {
    pub(crate) cluster_api: Api<ScalewayCluster>,
    pub(crate) machine_api: Api<ScalewayMachine>,
    pub(crate) secret_api: Api<Secret>,
}

impl Reconciler {
    pub fn new(
        cluster_api: Api<ScalewayCluster>,
        machine_api: Api<ScalewayMachine>,
        secret_api: Api<Secret>,
    ) -> Self {
        Self {
            cluster_api,
            machine_api,
            secret_api,
        }
    }

    /// Build a Scaleway client from the credentials secret a cluster
    /// references.
    pub(crate) async fn scaleway_client_for(
        &self,
        cluster: &ScalewayCluster,
    ) -> Result<Arc<dyn ScalewayClientTrait>, ControllerError> {
        let secret = self
            .secret_api
            .get(&cluster.spec.scaleway_secret_name)
            .await?;
        Ok(Arc::new(scaleway_client_from_secret(&secret)?))
    }

    /// Add a finalizer to a resource if it does not carry it yet.
    ///
    /// Returns the object as patched, so callers keep working with the
    /// current resourceVersion.
    pub(crate) async fn ensure_finalizer<K>(
        &self,
        api: &Api<K>,
        obj: &K,
        finalizer: &str,
    ) -> Result<K, ControllerError>
    where
        K: Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
        K::DynamicType: Default,
    {
        if obj.finalizers().iter().any(|f| f == finalizer) {
            return Ok(obj.clone());
        }
        let mut finalizers = obj.finalizers().to_vec();
        finalizers.push(finalizer.to_string());
        let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
        debug!(name = %obj.name_any(), finalizer, "Adding finalizer");
        Ok(api
            .patch(
                &obj.name_any(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await?)
    }

    /// Remove a finalizer from a resource, letting the API server complete
    /// the deletion.
    pub(crate) async fn remove_finalizer<K>(
        &self,
        api: &Api<K>,
        obj: &K,
        finalizer: &str,
    ) -> Result<(), ControllerError>
    where
        K: Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
        K::DynamicType: Default,
    {
        let finalizers: Vec<String> = obj
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != finalizer)
            .cloned()
            .collect();
        let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
        debug!(name = %obj.name_any(), finalizer, "Removing finalizer");
        api.patch(
            &obj.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}

/// True for a Kubernetes API error with a NotFound status.
pub(crate) fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}
