//! Scaleway infrastructure controller
//!
//! Reconciles the infrastructure CRDs against the Scaleway cloud:
//! - ScalewayCluster: private network, public gateway, control-plane load
//!   balancer and security groups
//! - ScalewayMachine: compute instances, flexible IPs and their bootstrap
//!   payload
//!
//! Credentials come from a Kubernetes secret referenced by each
//! ScalewayCluster, never from the controller's environment.

mod controller;
mod error;
mod reconciler;
mod scope;
mod secret;
mod service;
mod watcher;

use crate::error::ControllerError;
use controller::Controller;
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting Scaleway infrastructure controller");

    let namespace = env::var("WATCH_NAMESPACE").ok();
    info!(
        "Watching namespace: {}",
        namespace.as_deref().unwrap_or("default")
    );

    let controller = Controller::new(namespace).await?;
    controller.run().await?;

    Ok(())
}
