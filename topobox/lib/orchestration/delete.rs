use crate::{
    management::{SandboxLock, StateStore},
    models::{ResourceStatus, Sandbox, SandboxStatus},
    provision::ProvisioningGateway,
    utils, ProvisioningError, TopoboxError, TopoboxResult,
};

use super::{Orchestrator, Phase, TEARDOWN_ORDER};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// How [`Orchestrator::delete`] reacts to teardown failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Stop at the first teardown failure and keep the record.
    #[default]
    Strict,

    /// Log teardown failures, carry on through every resource, then drop the record.
    Force,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<G> Orchestrator<G>
where
    G: ProvisioningGateway,
{
    /// Tears down the sandbox `name` and removes its record.
    ///
    /// Nodes are torn down first, in reverse template order, then networks, also in reverse.
    ///
    /// In [`DeleteMode::Strict`] the first teardown failure ends the operation: the resource is
    /// marked `error`, the record is kept in the `error` state, and
    /// [`TopoboxError::ResidualResources`] names the resource. Resources torn down before the
    /// failure are recorded as `deleted`, so a retry picks up where this attempt stopped.
    ///
    /// In [`DeleteMode::Force`] teardown failures are logged and skipped and the record is
    /// removed at the end no matter what. A sandbox without a record is already deleted, and a
    /// record that cannot be decoded is removed without touching any resource, as in
    /// [`force_delete`].
    pub async fn delete(&self, name: &str, mode: DeleteMode) -> TopoboxResult<()> {
        match mode {
            DeleteMode::Strict => self.delete_strict(name).await,
            DeleteMode::Force => self.delete_forced(name).await,
        }
    }

    async fn delete_strict(&self, name: &str) -> TopoboxResult<()> {
        self.ensure_exists(name).await?;

        let lock = self.state.lock(name).await?;
        let mut sandbox = self.state.load(name).await?;

        sandbox.set_status(SandboxStatus::Deleting);
        self.state.save(&sandbox).await?;
        tracing::info!("deleting sandbox {}", name);

        for phase in TEARDOWN_ORDER {
            tracing::debug!("sandbox {}: tearing down {}", name, phase);
            let failure = match phase {
                Phase::Nodes => self.teardown_nodes(&mut sandbox, DeleteMode::Strict).await?,
                Phase::Networks => {
                    self.teardown_networks(&mut sandbox, DeleteMode::Strict)
                        .await?
                }
            };

            if let Some(source) = failure {
                sandbox.set_status(SandboxStatus::Error);
                self.state.save(&sandbox).await?;
                tracing::info!("sandbox {} kept with residual resources: {}", name, source);

                return Err(TopoboxError::ResidualResources {
                    sandbox: name.to_string(),
                    source,
                });
            }
        }

        self.state.remove(name).await?;
        lock.remove().await?;
        tracing::info!("sandbox {} deleted", name);

        Ok(())
    }

    async fn delete_forced(&self, name: &str) -> TopoboxResult<()> {
        utils::validate_name(name)?;
        if !self.state.exists(name).await? {
            tracing::info!("sandbox {} has no record, nothing to delete", name);
            return Ok(());
        }

        let lock = self.state.lock(name).await?;
        let mut sandbox = match self.state.load(name).await {
            Ok(sandbox) => sandbox,
            Err(TopoboxError::SandboxNotFound(_)) => {
                return drop_record(&self.state, name, lock).await
            }
            Err(e @ TopoboxError::CorruptedRecord { .. }) => {
                tracing::warn!("{}, removing it without teardown", e);
                return drop_record(&self.state, name, lock).await;
            }
            Err(e) => return Err(e),
        };

        sandbox.set_status(SandboxStatus::Deleting);
        self.state.save(&sandbox).await?;
        tracing::info!("force deleting sandbox {}", name);

        for phase in TEARDOWN_ORDER {
            tracing::debug!("sandbox {}: tearing down {}", name, phase);
            match phase {
                Phase::Nodes => self.teardown_nodes(&mut sandbox, DeleteMode::Force).await?,
                Phase::Networks => {
                    self.teardown_networks(&mut sandbox, DeleteMode::Force)
                        .await?
                }
            };
        }

        if !sandbox.all_deleted() {
            tracing::warn!(
                "sandbox {} forgotten with resources left on the backend",
                name
            );
        }

        drop_record(&self.state, name, lock).await
    }

    /// Tears down every node still holding a backend instance, last node first.
    ///
    /// In strict mode the first failure is returned. In force mode failures are logged and the
    /// loop carries on, so the result is always `None`.
    async fn teardown_nodes(
        &self,
        sandbox: &mut Sandbox,
        mode: DeleteMode,
    ) -> TopoboxResult<Option<ProvisioningError>> {
        for index in (0..sandbox.nodes.len()).rev() {
            let node = &sandbox.nodes[index];
            if node.status == ResourceStatus::Deleted {
                continue;
            }

            let result = match &node.handle {
                Some(handle) => self.gateway.teardown_node(node, handle).await,
                None => Ok(()),
            };

            match result {
                Ok(()) => {
                    tracing::debug!("sandbox {}: node {} deleted", sandbox.name, node.name);
                    Self::mark_node(sandbox, index, ResourceStatus::Deleted);
                }
                Err(e) => {
                    Self::mark_node(sandbox, index, ResourceStatus::Error);
                    Self::record_failure(sandbox, &e);
                    if mode == DeleteMode::Strict {
                        self.state.save(sandbox).await?;
                        return Ok(Some(e));
                    }

                    tracing::warn!("sandbox {}: ignoring teardown failure of {}", sandbox.name, e);
                }
            }

            if mode == DeleteMode::Strict {
                self.state.save(sandbox).await?;
            }
        }

        Ok(None)
    }

    /// Tears down every network still holding a backend instance, last network first.
    async fn teardown_networks(
        &self,
        sandbox: &mut Sandbox,
        mode: DeleteMode,
    ) -> TopoboxResult<Option<ProvisioningError>> {
        for index in (0..sandbox.networks.len()).rev() {
            let network = &sandbox.networks[index];
            if network.status == ResourceStatus::Deleted {
                continue;
            }

            let result = match &network.handle {
                Some(handle) => self.gateway.teardown_network(network, handle).await,
                None => Ok(()),
            };

            match result {
                Ok(()) => {
                    tracing::debug!(
                        "sandbox {}: network {} deleted",
                        sandbox.name,
                        network.name
                    );
                    Self::mark_network(sandbox, index, ResourceStatus::Deleted);
                }
                Err(e) => {
                    Self::mark_network(sandbox, index, ResourceStatus::Error);
                    Self::record_failure(sandbox, &e);
                    if mode == DeleteMode::Strict {
                        self.state.save(sandbox).await?;
                        return Ok(Some(e));
                    }

                    tracing::warn!("sandbox {}: ignoring teardown failure of {}", sandbox.name, e);
                }
            }

            if mode == DeleteMode::Strict {
                self.state.save(sandbox).await?;
            }
        }

        Ok(None)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Removes the record of `name` without tearing down any resource.
///
/// This is the last resort for records that cannot be loaded at all, and it needs nothing but
/// the state store. Whatever the record described may be left running on the backend. Removing
/// an absent record succeeds.
pub async fn force_delete(state: &StateStore, name: &str) -> TopoboxResult<()> {
    utils::validate_name(name)?;
    let lock = state.lock(name).await?;
    drop_record(state, name, lock).await
}

/// Removes the record of `name`, then the lock file while `lock` still holds it.
async fn drop_record(state: &StateStore, name: &str, lock: SandboxLock) -> TopoboxResult<()> {
    if state.remove(name).await? {
        tracing::info!("sandbox {} deleted", name);
    } else {
        tracing::info!("sandbox {} has no record, nothing to delete", name);
    }

    lock.remove().await
}
