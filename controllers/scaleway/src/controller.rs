//! Main controller implementation.
//!
//! This module contains the `Controller` struct that orchestrates
//! reconciliation and resource watching for the Scaleway infrastructure
//! controller.
//!
//! The controller manages two CRD types:
//! - ScalewayCluster: cluster-scoped cloud resources (private network,
//!   public gateway, control-plane load balancer, security groups)
//! - ScalewayMachine: compute instances and their attachments

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::{ScalewayCluster, ScalewayMachine};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for Scaleway infrastructure management.
pub struct Controller {
    cluster_watcher: JoinHandle<Result<(), ControllerError>>,
    machine_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(namespace: Option<String>) -> Result<Self, ControllerError> {
        info!("Initializing Scaleway infrastructure controller");

        let kube_client = Client::try_default().await?;

        let ns = namespace.as_deref().unwrap_or("default");
        let cluster_api: Api<ScalewayCluster> = Api::namespaced(kube_client.clone(), ns);
        let machine_api: Api<ScalewayMachine> = Api::namespaced(kube_client.clone(), ns);
        let secret_api: Api<Secret> = Api::namespaced(kube_client, ns);

        let reconciler = Arc::new(Reconciler::new(
            cluster_api.clone(),
            machine_api.clone(),
            secret_api,
        ));
        let watcher = Arc::new(Watcher::new(reconciler, cluster_api, machine_api));

        let cluster_watcher = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.watch_scaleway_clusters().await })
        };
        let machine_watcher =
            tokio::spawn(async move { watcher.watch_scaleway_machines().await });

        Ok(Self {
            cluster_watcher,
            machine_watcher,
        })
    }

    /// Runs the controller until one of the watchers exits.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Scaleway infrastructure controller running");

        tokio::select! {
            result = &mut self.cluster_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("ScalewayCluster watcher panicked: {e}")))?
                    .map_err(|e| ControllerError::Watch(format!("ScalewayCluster watcher error: {e}")))?;
            }
            result = &mut self.machine_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("ScalewayMachine watcher panicked: {e}")))?
                    .map_err(|e| ControllerError::Watch(format!("ScalewayMachine watcher error: {e}")))?;
            }
        }

        self.cluster_watcher.abort();
        self.machine_watcher.abort();
        Ok(())
    }
}
