//! Kubernetes resource watchers.
//!
//! This module handles watching the infrastructure CRDs for changes and
//! triggering reconciliation using kube_runtime::Controller.
//!
//! Both watchers use a generic `watch_resource()` helper that properly
//! handles the reconcile loop with automatic reconnection and retry logic.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::{ScalewayCluster, ScalewayMachine};
use futures::StreamExt;
use kube::Api;
use kube_runtime::{
    controller::{Action, Config as ControllerConfig},
    watcher, Controller,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Generic watcher helper that uses kube_runtime::Controller.
///
/// The Controller handles automatic reconnection, retries and backoff, and
/// keeps watching indefinitely. The reconcile_fn wraps one of the
/// Reconciler's per-kind reconcile methods.
async fn watch_resource<K, F>(
    api: Api<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    resource_name: &str,
) -> Result<(), ControllerError>
where
    K: kube::Resource
        + Clone
        + Send
        + Sync
        + 'static
        + std::fmt::Debug
        + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone + std::fmt::Debug + Unpin,
    F: Fn(
            Arc<Reconciler>,
            Arc<K>,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<Action, ControllerError>> + Send>,
        > + Send
        + Sync
        + Clone
        + 'static,
{
    info!("Starting {} watcher", resource_name);

    let error_policy = |obj: Arc<K>, error: &ControllerError, _ctx: Arc<Reconciler>| {
        error!("Reconciliation error for {} {:?}: {}", resource_name, obj, error);
        Action::requeue(Duration::from_secs(60))
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        let resource_name = resource_name.to_string();
        async move {
            debug!("Reconciling {} {:?}", resource_name, obj);
            match reconcile_fn(ctx, obj).await {
                Ok(action) => Ok(action),
                Err(e) => {
                    error!("Reconciliation failed for {}: {}", resource_name, e);
                    Err(e)
                }
            }
        }
    };

    // Debounce batches bursts of status updates, concurrency caps the number
    // of in-flight reconciliations per watcher.
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(1))
        .concurrency(3);

    Controller::new(api, watcher::Config::default())
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("Controller error for {}: {}", resource_name, e);
            }
        })
        .await;

    Ok(())
}

/// Watches the infrastructure CRDs for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    cluster_api: Api<ScalewayCluster>,
    machine_api: Api<ScalewayMachine>,
}

impl Watcher {
    pub fn new(
        reconciler: Arc<Reconciler>,
        cluster_api: Api<ScalewayCluster>,
        machine_api: Api<ScalewayMachine>,
    ) -> Self {
        Self {
            reconciler,
            cluster_api,
            machine_api,
        }
    }

    /// Starts watching ScalewayCluster resources.
    pub async fn watch_scaleway_clusters(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.cluster_api.clone(),
            self.reconciler.clone(),
            |reconciler, resource| {
                Box::pin(async move { reconciler.reconcile_scaleway_cluster(&resource).await })
            },
            "ScalewayCluster",
        )
        .await
    }

    /// Starts watching ScalewayMachine resources.
    pub async fn watch_scaleway_machines(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.machine_api.clone(),
            self.reconciler.clone(),
            |reconciler, resource| {
                Box::pin(async move { reconciler.reconcile_scaleway_machine(&resource).await })
            },
            "ScalewayMachine",
        )
        .await
    }
}
