use crate::{
    models::{ResourceStatus, Sandbox, SandboxStatus},
    provision::ProvisioningGateway,
    TopoboxError, TopoboxResult,
};

use super::Orchestrator;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<G> Orchestrator<G>
where
    G: ProvisioningGateway,
{
    /// Stops every node of the sandbox `name`, in reverse template order.
    ///
    /// Stopping is best effort: a node that fails to stop is marked `error` and the remaining
    /// nodes are still stopped. Nodes that are not provisioned or already stopped are left
    /// alone, and networks are never touched.
    ///
    /// The sandbox ends up `stopped` only if every stop succeeded. A partial stop does not mark
    /// it `stopped`: a sandbox is never `stopped` while one of its nodes is still up, so it is
    /// saved as `error` instead and [`TopoboxError::IncompleteStop`] names the nodes that failed.
    /// Callers therefore get an error, and the CLI a non-zero exit, even though every other node
    /// was stopped.
    pub async fn stop(&self, name: &str) -> TopoboxResult<Sandbox> {
        self.ensure_exists(name).await?;

        let _lock = self.state.lock(name).await?;
        let mut sandbox = self.state.load(name).await?;

        sandbox.set_status(SandboxStatus::Stopping);
        self.state.save(&sandbox).await?;
        tracing::info!("stopping sandbox {}", name);

        let mut failed = Vec::new();
        for index in (0..sandbox.nodes.len()).rev() {
            let node = &sandbox.nodes[index];
            let handle = match (&node.handle, node.status) {
                (_, ResourceStatus::Stopped) => continue,
                (Some(handle), _) => handle,
                (None, _) => continue,
            };

            match self.gateway.stop_node(node, handle).await {
                Ok(()) => {
                    tracing::debug!("sandbox {}: node {} stopped", name, node.name);
                    Self::mark_node(&mut sandbox, index, ResourceStatus::Stopped);
                }
                Err(e) => {
                    tracing::warn!("sandbox {}: failed to stop {}", name, e);
                    failed.push(node.name.clone());
                    Self::mark_node(&mut sandbox, index, ResourceStatus::Error);
                    Self::record_failure(&mut sandbox, &e);
                }
            }

            self.state.save(&sandbox).await?;
        }

        failed.reverse();
        if failed.is_empty() {
            sandbox.set_status(SandboxStatus::Stopped);
            self.state.save(&sandbox).await?;
            tracing::info!("sandbox {} is stopped", name);
            return Ok(sandbox);
        }

        sandbox.set_status(SandboxStatus::Error);
        self.state.save(&sandbox).await?;
        tracing::info!("sandbox {} is error, {} node(s) still up", name, failed.len());

        Err(TopoboxError::IncompleteStop {
            sandbox: name.to_string(),
            nodes: failed,
        })
    }
}
