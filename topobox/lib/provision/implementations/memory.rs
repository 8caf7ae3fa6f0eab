use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Display},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    models::{Network, Node},
    provision::{NetworkHandle, NodeHandle, ProvisioningGateway},
    ProvisionResult, ProvisioningError,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An in-process provisioning backend.
///
/// Nothing is realized outside the process: networks and nodes live in a table guarded by a
/// mutex. Every call is appended to a log, and individual calls can be made to fail with
/// [`MemoryGateway::fail_on`]. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    inner: Arc<Mutex<MemoryGatewayInner>>,
}

/// A gateway operation, as recorded in the call log of a [`MemoryGateway`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `provision_network`
    ProvisionNetwork,

    /// `teardown_network`
    TeardownNetwork,

    /// `provision_node`
    ProvisionNode,

    /// `teardown_node`
    TeardownNode,

    /// `start_node`
    StartNode,

    /// `stop_node`
    StopNode,
}

/// A single recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// The operation invoked.
    pub operation: Operation,

    /// The name of the resource it was invoked on.
    pub name: String,
}

#[derive(Debug, Default)]
struct MemoryGatewayInner {
    next_id: u64,
    networks: HashMap<NetworkHandle, String>,
    nodes: HashMap<NodeHandle, MemoryNode>,
    calls: Vec<Call>,
    faults: HashSet<(Operation, String)>,
}

#[derive(Debug)]
struct MemoryNode {
    name: String,
    running: bool,
    attached: Vec<NetworkHandle>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MemoryGateway {
    /// Creates an empty gateway with no faults armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `operation` on the resource called `name` fail.
    pub async fn fail_on(&self, operation: Operation, name: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.faults.insert((operation, name.into()));
    }

    /// Disarms every fault.
    pub async fn clear_faults(&self) {
        self.inner.lock().await.faults.clear();
    }

    /// Returns the calls made so far, oldest first. Failed calls are included.
    pub async fn calls(&self) -> Vec<Call> {
        self.inner.lock().await.calls.clone()
    }

    /// Returns the calls of a single operation, oldest first.
    pub async fn calls_of(&self, operation: Operation) -> Vec<String> {
        self.inner
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .map(|call| call.name.clone())
            .collect()
    }

    /// Returns the number of networks currently provisioned.
    pub async fn live_networks(&self) -> usize {
        self.inner.lock().await.networks.len()
    }

    /// Returns the number of nodes currently provisioned.
    pub async fn live_nodes(&self) -> usize {
        self.inner.lock().await.nodes.len()
    }

    /// Returns `true` if the node behind `handle` is provisioned and running.
    pub async fn is_running(&self, handle: &NodeHandle) -> bool {
        self.inner
            .lock()
            .await
            .nodes
            .get(handle)
            .is_some_and(|node| node.running)
    }

    /// Returns the networks the node behind `handle` was attached to.
    pub async fn attachments(&self, handle: &NodeHandle) -> Option<Vec<NetworkHandle>> {
        self.inner
            .lock()
            .await
            .nodes
            .get(handle)
            .map(|node| node.attached.clone())
    }
}

impl MemoryGatewayInner {
    /// Logs the call and reports whether a fault is armed for it.
    fn record(&mut self, operation: Operation, name: &str) -> bool {
        self.calls.push(Call {
            operation,
            name: name.to_string(),
        });

        self.faults.contains(&(operation, name.to_string()))
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn node_mut(&mut self, node: &Node, handle: &NodeHandle) -> ProvisionResult<&mut MemoryNode> {
        self.nodes
            .get_mut(handle)
            .ok_or_else(|| ProvisioningError::node(&node.name, format!("unknown handle '{handle}'")))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ProvisioningGateway for MemoryGateway {
    async fn provision_network(
        &self,
        sandbox: &str,
        network: &Network,
    ) -> ProvisionResult<NetworkHandle> {
        let mut inner = self.inner.lock().await;
        if inner.record(Operation::ProvisionNetwork, &network.name) {
            return Err(ProvisioningError::network(&network.name, "injected failure"));
        }

        let handle = NetworkHandle::new(format!(
            "mem-net-{}-{}-{}",
            sandbox,
            network.name,
            inner.next_id()
        ));
        inner.networks.insert(handle.clone(), network.name.clone());

        Ok(handle)
    }

    async fn teardown_network(
        &self,
        network: &Network,
        handle: &NetworkHandle,
    ) -> ProvisionResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.record(Operation::TeardownNetwork, &network.name) {
            return Err(ProvisioningError::network(&network.name, "injected failure"));
        }

        let in_use = inner
            .nodes
            .values()
            .any(|node| node.attached.contains(handle));
        if in_use {
            return Err(ProvisioningError::network(
                &network.name,
                "network still has attached nodes",
            ));
        }

        match inner.networks.remove(handle) {
            Some(_) => Ok(()),
            None => Err(ProvisioningError::network(
                &network.name,
                format!("unknown handle '{handle}'"),
            )),
        }
    }

    async fn provision_node(
        &self,
        sandbox: &str,
        node: &Node,
        attached: &[NetworkHandle],
    ) -> ProvisionResult<NodeHandle> {
        let mut inner = self.inner.lock().await;
        if inner.record(Operation::ProvisionNode, &node.name) {
            return Err(ProvisioningError::node(&node.name, "injected failure"));
        }

        if let Some(missing) = attached.iter().find(|h| !inner.networks.contains_key(*h)) {
            return Err(ProvisioningError::node(
                &node.name,
                format!("cannot attach to unknown network '{missing}'"),
            ));
        }

        let handle = NodeHandle::new(format!(
            "mem-node-{}-{}-{}",
            sandbox,
            node.name,
            inner.next_id()
        ));
        inner.nodes.insert(
            handle.clone(),
            MemoryNode {
                name: node.name.clone(),
                running: true,
                attached: attached.to_vec(),
            },
        );

        Ok(handle)
    }

    async fn teardown_node(&self, node: &Node, handle: &NodeHandle) -> ProvisionResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.record(Operation::TeardownNode, &node.name) {
            return Err(ProvisioningError::node(&node.name, "injected failure"));
        }

        match inner.nodes.remove(handle) {
            Some(removed) => {
                tracing::trace!("memory gateway removed node {}", removed.name);
                Ok(())
            }
            None => Err(ProvisioningError::node(
                &node.name,
                format!("unknown handle '{handle}'"),
            )),
        }
    }

    async fn start_node(&self, node: &Node, handle: &NodeHandle) -> ProvisionResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.record(Operation::StartNode, &node.name) {
            return Err(ProvisioningError::node(&node.name, "injected failure"));
        }

        inner.node_mut(node, handle)?.running = true;
        Ok(())
    }

    async fn stop_node(&self, node: &Node, handle: &NodeHandle) -> ProvisionResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.record(Operation::StopNode, &node.name) {
            return Err(ProvisioningError::node(&node.name, "injected failure"));
        }

        inner.node_mut(node, handle)?.running = false;
        Ok(())
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operation = match self {
            Operation::ProvisionNetwork => "provision_network",
            Operation::TeardownNetwork => "teardown_network",
            Operation::ProvisionNode => "provision_node",
            Operation::TeardownNode => "teardown_node",
            Operation::StartNode => "start_node",
            Operation::StopNode => "stop_node",
        };
        write!(f, "{operation}")
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
