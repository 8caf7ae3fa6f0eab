use crate::{
    models::{ResourceStatus, Sandbox, SandboxStatus},
    provision::ProvisioningGateway,
    ProvisioningError, TopoboxError, TopoboxResult,
};

use super::Orchestrator;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<G> Orchestrator<G>
where
    G: ProvisioningGateway,
{
    /// Starts every node of the sandbox `name`, in template order.
    ///
    /// Starting an `active` sandbox does nothing. Networks are not started: they stay active for
    /// as long as they are provisioned, and a sandbox with a network that is not active cannot be
    /// started at all. The first node that fails to start, or that has no provisioned instance to
    /// start, stops the operation; the record is saved in the `error` state and
    /// [`TopoboxError::Provisioning`] is returned.
    pub async fn start(&self, name: &str) -> TopoboxResult<Sandbox> {
        self.ensure_exists(name).await?;

        let _lock = self.state.lock(name).await?;
        let mut sandbox = self.state.load(name).await?;
        if sandbox.status == SandboxStatus::Active {
            tracing::info!("sandbox {} is already active", name);
            return Ok(sandbox);
        }

        sandbox.set_status(SandboxStatus::Starting);
        self.state.save(&sandbox).await?;
        tracing::info!("starting sandbox {}", name);

        let failure = self.start_nodes(&mut sandbox).await?;
        sandbox.set_status(sandbox.settled_status());
        self.state.save(&sandbox).await?;

        match failure {
            None => {
                tracing::info!("sandbox {} is {}", name, sandbox.status);
                Ok(sandbox)
            }
            Some(source) => {
                tracing::info!("sandbox {} is {}: {}", name, sandbox.status, source);
                Err(TopoboxError::Provisioning {
                    sandbox: name.to_string(),
                    source,
                })
            }
        }
    }

    async fn start_nodes(&self, sandbox: &mut Sandbox) -> TopoboxResult<Option<ProvisioningError>> {
        // Nodes cannot come up on networks that were never provisioned.
        if let Some(network) = sandbox
            .networks
            .iter()
            .find(|n| n.status != ResourceStatus::Active)
        {
            let e = ProvisioningError::network(
                &network.name,
                format!("network is {} and cannot carry nodes", network.status),
            );
            Self::record_failure(sandbox, &e);
            self.state.save(sandbox).await?;
            return Ok(Some(e));
        }

        for index in 0..sandbox.nodes.len() {
            let node = &sandbox.nodes[index];
            if node.status == ResourceStatus::Active {
                continue;
            }

            let result = match &node.handle {
                Some(handle) => self.gateway.start_node(node, handle).await,
                None => Err(ProvisioningError::node(
                    &node.name,
                    format!("node is {} and has nothing to start", node.status),
                )),
            };

            match result {
                Ok(()) => {
                    tracing::debug!("sandbox {}: node {} started", sandbox.name, node.name);
                    Self::mark_node(sandbox, index, ResourceStatus::Active);
                    self.state.save(sandbox).await?;
                }
                Err(e) => {
                    Self::mark_node(sandbox, index, ResourceStatus::Error);
                    Self::record_failure(sandbox, &e);
                    self.state.save(sandbox).await?;
                    return Ok(Some(e));
                }
            }
        }

        Ok(None)
    }
}
