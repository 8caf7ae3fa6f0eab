use ipnetwork::Ipv4Network;

use crate::{
    config::Template,
    models::{ResourceStatus, Sandbox},
    provision::ProvisioningGateway,
    utils, ProvisioningError, TopoboxError, TopoboxResult,
};

use super::{Orchestrator, Phase, PROVISION_ORDER};

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<G> Orchestrator<G>
where
    G: ProvisioningGateway,
{
    /// Creates the sandbox `name` from the template `template`.
    ///
    /// The record is saved in the `creating` state before any resource is touched. Networks are
    /// then provisioned in template order, followed by nodes once every network is active. The
    /// first failure stops the current phase and every later one; nothing already provisioned is
    /// rolled back.
    ///
    /// A missing template, a node image absent from the image store, or an exhausted subnet
    /// pool fails the create before any record is written.
    ///
    /// On a resource failure the partial record is saved in the `error` state and
    /// [`TopoboxError::Provisioning`] is returned.
    pub async fn create(&self, name: &str, template: &str) -> TopoboxResult<Sandbox> {
        utils::validate_name(name)?;
        if self.state.exists(name).await? {
            return Err(TopoboxError::AlreadyExists(name.to_string()));
        }

        let lock = self.state.lock(name).await?;
        if self.state.exists(name).await? {
            return Err(TopoboxError::AlreadyExists(name.to_string()));
        }

        // Nothing is persisted for a sandbox whose plan fails, not even its lock file.
        let (template, cidrs) = match self.plan(template).await {
            Ok(plan) => plan,
            Err(e) => {
                lock.remove().await?;
                return Err(e);
            }
        };

        let mut sandbox = Sandbox::from_template(name, &template, &cidrs);
        self.state.save(&sandbox).await?;
        tracing::info!(
            "creating sandbox {} from template {}",
            name,
            template.get_name()
        );

        let failure = self.provision(&mut sandbox).await?;
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

    /// Resolves the template, checks its images and picks the CIDR of each of its networks.
    async fn plan(&self, template: &str) -> TopoboxResult<(Template, Vec<Ipv4Network>)> {
        let template = self.templates.resolve(template).await?;
        self.check_images(&template).await?;

        let taken = self.taken_cidrs().await?;
        let cidrs = self.subnets.allocate(&template, &taken)?;

        Ok((template, cidrs))
    }

    /// Provisions every phase in order, stopping at the first resource failure.
    async fn provision(&self, sandbox: &mut Sandbox) -> TopoboxResult<Option<ProvisioningError>> {
        for phase in PROVISION_ORDER {
            tracing::debug!("sandbox {}: provisioning {}", sandbox.name, phase);
            let failure = match phase {
                Phase::Networks => self.provision_networks(sandbox).await?,
                Phase::Nodes => self.provision_nodes(sandbox).await?,
            };

            if failure.is_some() {
                return Ok(failure);
            }
        }

        Ok(None)
    }

    async fn provision_networks(
        &self,
        sandbox: &mut Sandbox,
    ) -> TopoboxResult<Option<ProvisioningError>> {
        for index in 0..sandbox.networks.len() {
            let result = self
                .gateway
                .provision_network(&sandbox.name, &sandbox.networks[index])
                .await;

            match result {
                Ok(handle) => {
                    tracing::debug!(
                        "sandbox {}: network {} is active ({})",
                        sandbox.name,
                        sandbox.networks[index].name,
                        handle
                    );
                    sandbox.networks[index].handle = Some(handle);
                    Self::mark_network(sandbox, index, ResourceStatus::Active);
                    self.state.save(sandbox).await?;
                }
                Err(e) => {
                    Self::mark_network(sandbox, index, ResourceStatus::Error);
                    Self::record_failure(sandbox, &e);
                    self.state.save(sandbox).await?;
                    return Ok(Some(e));
                }
            }
        }

        Ok(None)
    }

    async fn provision_nodes(
        &self,
        sandbox: &mut Sandbox,
    ) -> TopoboxResult<Option<ProvisioningError>> {
        for index in 0..sandbox.nodes.len() {
            let attached = sandbox.attached_handles(&sandbox.nodes[index]);
            let result = self
                .gateway
                .provision_node(&sandbox.name, &sandbox.nodes[index], &attached)
                .await;

            match result {
                Ok(handle) => {
                    tracing::debug!(
                        "sandbox {}: node {} is active ({})",
                        sandbox.name,
                        sandbox.nodes[index].name,
                        handle
                    );
                    sandbox.nodes[index].handle = Some(handle);
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
