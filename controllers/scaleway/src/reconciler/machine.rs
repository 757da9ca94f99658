//! ScalewayMachine reconciliation.

use super::{is_not_found, Reconciler, NOT_READY_REQUEUE_SECS};
use crate::error::{ControllerError, NotReadyReason};
use crate::scope::{ClusterScope, MachineScope};
use crate::secret::bootstrap_payload;
use crate::service::instance;
use crds::{ScalewayMachine, MACHINE_FINALIZER};
use kube::api::{Patch, PatchParams};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::time::Duration;
use tracing::{debug, info};

impl Reconciler {
    /// Reconcile a single ScalewayMachine.
    pub async fn reconcile_scaleway_machine(
        &self,
        machine: &ScalewayMachine,
    ) -> Result<Action, ControllerError> {
        let name = machine.name_any();

        if machine.metadata.deletion_timestamp.is_some() {
            return self.delete_scaleway_machine(machine).await;
        }

        let cluster_scope = match self.owner_cluster_scope(machine).await {
            Ok(scope) => scope,
            Err(ControllerError::NotReady(reason)) => {
                debug!(machine = %name, %reason, "Machine not ready, requeuing");
                return Ok(Action::requeue(Duration::from_secs(NOT_READY_REQUEUE_SECS)));
            }
            Err(e) => return Err(e),
        };

        let machine = self
            .ensure_finalizer(&self.machine_api, machine, MACHINE_FINALIZER)
            .await?;

        let bootstrap_data = self.bootstrap_data(&machine).await?;
        let mut scope = MachineScope::new(machine.clone(), cluster_scope, bootstrap_data);

        let result = instance::reconcile(&mut scope).await;

        self.flush_machine_status(&scope).await?;
        self.flush_provider_id(&machine, &scope).await?;

        match result {
            Ok(()) => {
                info!(machine = %name, "Machine is ready");
                Ok(Action::await_change())
            }
            Err(ControllerError::NotReady(reason)) => {
                debug!(machine = %name, %reason, "Machine not ready, requeuing");
                Ok(Action::requeue(Duration::from_secs(NOT_READY_REQUEUE_SECS)))
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_scaleway_machine(
        &self,
        machine: &ScalewayMachine,
    ) -> Result<Action, ControllerError> {
        let name = machine.name_any();
        if !machine.finalizers().iter().any(|f| f == MACHINE_FINALIZER) {
            return Ok(Action::await_change());
        }

        info!(machine = %name, "Deleting machine infrastructure");
        let cluster = self.cluster_api.get(&machine.spec.cluster_name).await?;
        let client = self.scaleway_client_for(&cluster).await?;
        let scope = MachineScope::new(
            machine.clone(),
            ClusterScope::new(cluster, client),
            None,
        );

        match instance::delete(&scope).await {
            Ok(()) => {}
            // The server is powering off, come back when the transition
            // finished.
            Err(ControllerError::NotReady(reason)) => {
                debug!(machine = %name, %reason, "Instance still draining, requeuing");
                return Ok(Action::requeue(Duration::from_secs(NOT_READY_REQUEUE_SECS)));
            }
            Err(e) => return Err(e),
        }

        self.remove_finalizer(&self.machine_api, machine, MACHINE_FINALIZER)
            .await?;
        info!(machine = %name, "Machine infrastructure deleted");
        Ok(Action::await_change())
    }

    /// Build the scope of the owner cluster.
    ///
    /// Machines wait for their cluster's network to exist before creating
    /// anything.
    async fn owner_cluster_scope(
        &self,
        machine: &ScalewayMachine,
    ) -> Result<ClusterScope, ControllerError> {
        let cluster = match self.cluster_api.get(&machine.spec.cluster_name).await {
            Ok(cluster) => cluster,
            Err(e) if is_not_found(&e) => {
                return Err(ControllerError::NotReady(
                    NotReadyReason::OwnerClusterNotReady,
                ))
            }
            Err(e) => return Err(e.into()),
        };
        if !cluster.status.as_ref().is_some_and(|s| s.ready) {
            return Err(ControllerError::NotReady(
                NotReadyReason::OwnerClusterNotReady,
            ));
        }
        let client = self.scaleway_client_for(&cluster).await?;
        Ok(ClusterScope::new(cluster, client))
    }

    /// Fetch the raw bootstrap payload of a machine, if its secret exists
    /// already.
    async fn bootstrap_data(
        &self,
        machine: &ScalewayMachine,
    ) -> Result<Option<String>, ControllerError> {
        let Some(secret_name) = &machine.spec.bootstrap_secret_name else {
            return Ok(None);
        };
        match self.secret_api.get(secret_name).await {
            Ok(secret) => Ok(Some(bootstrap_payload(&secret)?)),
            // The bootstrap provider has not written the secret yet. The
            // instance service requeues when it actually needs the payload.
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn flush_machine_status(&self, scope: &MachineScope) -> Result<(), ControllerError> {
        // The resourceVersion makes the patch fail on a concurrent edit
        // instead of overwriting it.
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": scope.machine.metadata.resource_version },
            "status": scope.status,
        });
        match self
            .machine_api
            .patch_status(
                scope.name(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the provider ID the first time the instance service assigned
    /// it. It never changes afterwards.
    async fn flush_provider_id(
        &self,
        machine: &ScalewayMachine,
        scope: &MachineScope,
    ) -> Result<(), ControllerError> {
        if machine.spec.provider_id.is_some() {
            return Ok(());
        }
        let Some(provider_id) = &scope.machine.spec.provider_id else {
            return Ok(());
        };
        let patch = serde_json::json!({ "spec": { "providerId": provider_id } });
        match self
            .machine_api
            .patch(
                scope.name(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
