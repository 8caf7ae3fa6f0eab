use std::fmt::{self, Display};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    models::{Network, Node},
    ProvisionResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The backend identity of a provisioned network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkHandle(String);

/// The backend identity of a provisioned node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeHandle(String);

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Creates, destroys, starts and stops individual sandbox resources.
///
/// Calls are issued one at a time, in dependency order, and may block for a long time. Any
/// timeout is the implementation's business. Every failure is reported as a
/// [`ProvisioningError`](crate::ProvisioningError) naming the resource involved.
#[async_trait]
pub trait ProvisioningGateway: Send + Sync {
    /// Provisions a network for `sandbox`.
    async fn provision_network(
        &self,
        sandbox: &str,
        network: &Network,
    ) -> ProvisionResult<NetworkHandle>;

    /// Tears a network down.
    async fn teardown_network(&self, network: &Network, handle: &NetworkHandle)
        -> ProvisionResult<()>;

    /// Provisions a node for `sandbox`, attached to the given networks in interface order.
    async fn provision_node(
        &self,
        sandbox: &str,
        node: &Node,
        attached: &[NetworkHandle],
    ) -> ProvisionResult<NodeHandle>;

    /// Tears a node down.
    async fn teardown_node(&self, node: &Node, handle: &NodeHandle) -> ProvisionResult<()>;

    /// Starts a provisioned node.
    async fn start_node(&self, node: &Node, handle: &NodeHandle) -> ProvisionResult<()>;

    /// Stops a provisioned node.
    async fn stop_node(&self, node: &Node, handle: &NodeHandle) -> ProvisionResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl NetworkHandle {
    /// Creates a new network handle.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the backend identifier.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl NodeHandle {
    /// Creates a new node handle.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the backend identifier.
    pub fn id(&self) -> &str {
        &self.0
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for NetworkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
