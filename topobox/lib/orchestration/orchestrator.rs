use getset::Getters;
use ipnetwork::Ipv4Network;

use crate::{
    config::Template,
    management::{ImageStore, StateStore, TemplateStore},
    models::{ResourceStatus, Sandbox},
    provision::ProvisioningGateway,
    utils, ProvisioningError, TopoboxError, TopoboxResult,
};

use super::SubnetPool;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The lifecycle state machine of sandboxes.
///
/// Every operation works on one named sandbox, holds that sandbox's lock for its whole duration,
/// and issues gateway calls one at a time in dependency order. Each resource transition is saved
/// to the [`StateStore`] as soon as it happens.
///
/// ## Example
/// ```no_run
/// use topobox::{
///     config::Template,
///     management::{ImageStore, StateStore, TemplateStore},
///     orchestration::{DeleteMode, Orchestrator},
///     provision::MemoryGateway,
/// };
///
/// # async fn example() -> anyhow::Result<()> {
/// let home = std::path::Path::new("/tmp/topobox-home");
/// let orchestrator = Orchestrator::new(
///     TemplateStore::new(home.join("templates")),
///     StateStore::new(home),
///     MemoryGateway::new(),
/// );
///
/// orchestrator.create("sb1", "all-in-one").await?;
/// orchestrator.stop("sb1").await?;
/// orchestrator.start("sb1").await?;
/// orchestrator.delete("sb1", DeleteMode::Strict).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Orchestrator<G> {
    /// Where templates are resolved from.
    pub(super) templates: TemplateStore,

    /// Where sandbox records are persisted.
    pub(super) state: StateStore,

    /// The backend realizing the resources.
    pub(super) gateway: G,

    /// Where networks without a declared CIDR get their subnet from.
    pub(super) subnets: SubnetPool,

    /// The base images node images are checked against, if any.
    pub(super) images: Option<ImageStore>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<G> Orchestrator<G>
where
    G: ProvisioningGateway,
{
    /// Creates an orchestrator allocating subnets from the default pool.
    pub fn new(templates: TemplateStore, state: StateStore, gateway: G) -> Self {
        Self {
            templates,
            state,
            gateway,
            subnets: SubnetPool::default(),
            images: None,
        }
    }

    /// Replaces the subnet pool.
    pub fn with_subnet_pool(mut self, subnets: SubnetPool) -> Self {
        self.subnets = subnets;
        self
    }

    /// Makes `create` refuse templates whose nodes use images missing from `images`.
    ///
    /// Without an image store node images are passed to the gateway unchecked.
    pub fn with_image_store(mut self, images: ImageStore) -> Self {
        self.images = Some(images);
        self
    }

    /// Fails with [`TopoboxError::ImageNotFound`] for the first node whose image is missing.
    pub(super) async fn check_images(&self, template: &Template) -> TopoboxResult<()> {
        let Some(images) = &self.images else {
            return Ok(());
        };

        for node in template.get_nodes() {
            let Some(image) = node.get_image() else {
                continue;
            };

            if !images.exists(image).await? {
                return Err(TopoboxError::ImageNotFound {
                    template: template.get_name().clone(),
                    node: node.get_name().clone(),
                    image: image.clone(),
                });
            }
        }

        Ok(())
    }

    /// Validates `name` and fails with [`TopoboxError::SandboxNotFound`] if it has no record.
    ///
    /// Runs before any lock is taken so a missing sandbox causes no writes at all.
    pub(super) async fn ensure_exists(&self, name: &str) -> TopoboxResult<()> {
        utils::validate_name(name)?;
        if !self.state.exists(name).await? {
            return Err(TopoboxError::SandboxNotFound(name.to_string()));
        }

        Ok(())
    }

    /// Returns the CIDRs held by every readable sandbox record.
    pub(super) async fn taken_cidrs(&self) -> TopoboxResult<Vec<Ipv4Network>> {
        Ok(self
            .state
            .list()
            .await?
            .iter()
            .flat_map(|sandbox| sandbox.get_networks().iter().map(|n| *n.get_cidr()))
            .collect())
    }

    /// Marks the node at `index` with `status`, clearing its handle once it is deleted.
    pub(super) fn mark_node(sandbox: &mut Sandbox, index: usize, status: ResourceStatus) {
        let node = &mut sandbox.nodes[index];
        node.status = status;
        if status == ResourceStatus::Deleted {
            node.handle = None;
        }
        sandbox.touch();
    }

    /// Marks the network at `index` with `status`, clearing its handle once it is deleted.
    pub(super) fn mark_network(sandbox: &mut Sandbox, index: usize, status: ResourceStatus) {
        let network = &mut sandbox.networks[index];
        network.status = status;
        if status == ResourceStatus::Deleted {
            network.handle = None;
        }
        sandbox.touch();
    }

    /// Records a resource failure on the sandbox.
    pub(super) fn record_failure(sandbox: &mut Sandbox, error: &ProvisioningError) {
        tracing::debug!("sandbox {}: {}", sandbox.name, error);
        sandbox.last_error = Some(error.to_string());
        sandbox.touch();
    }
}
