use std::{
    collections::BTreeSet,
    fmt::{self, Display},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use getset::Getters;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::{
    config::{NetworkDef, NodeDef, Template, DEFAULT_NUM_VCPUS, DEFAULT_RAM_MIB},
    provision::{NetworkHandle, NodeHandle},
    TopoboxError, TopoboxResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The persisted record of a sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Sandbox {
    /// The unique name of the sandbox.
    pub(crate) name: String,

    /// The name of the template the sandbox was instantiated from.
    pub(crate) template: String,

    /// The lifecycle status of the sandbox.
    pub(crate) status: SandboxStatus,

    /// When the sandbox was created.
    pub(crate) created_at: DateTime<Utc>,

    /// When the record was last modified.
    pub(crate) modified_at: DateTime<Utc>,

    /// The text of the most recent resource failure.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub(crate) last_error: Option<String>,

    /// The networks, in template order.
    pub(crate) networks: Vec<Network>,

    /// The nodes, in template order.
    pub(crate) nodes: Vec<Node>,
}

/// A network instance of a sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Network {
    /// The name of the network within its sandbox.
    pub(crate) name: String,

    /// The resolved CIDR of the network.
    pub(crate) cidr: Ipv4Network,

    /// The lifecycle status of the network.
    pub(crate) status: ResourceStatus,

    /// The backend handle, present while the network is provisioned.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub(crate) handle: Option<NetworkHandle>,
}

/// A node instance of a sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Node {
    /// The name of the node within its sandbox.
    pub(crate) name: String,

    /// The services the node runs.
    #[serde(default)]
    pub(crate) services: BTreeSet<String>,

    /// The networks the node attaches to, in interface order.
    #[serde(default)]
    pub(crate) networks: Vec<String>,

    /// The base image of the node.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub(crate) image: Option<String>,

    /// The number of vCPUs.
    pub(crate) cpus: u8,

    /// The amount of RAM in MiB.
    pub(crate) ram_mib: u32,

    /// The lifecycle status of the node.
    pub(crate) status: ResourceStatus,

    /// The backend handle, present while the node is provisioned.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub(crate) handle: Option<NodeHandle>,
}

/// The status of a network or node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Not provisioned yet.
    Pending,

    /// Provisioned and running.
    Active,

    /// Provisioned but stopped.
    Stopped,

    /// The last transition of the resource failed.
    Error,

    /// Torn down.
    Deleted,
}

/// The status of a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxStatus {
    /// Resources are being provisioned.
    Creating,

    /// Every network and node is active.
    Active,

    /// Nodes are being stopped.
    Stopping,

    /// Nodes are stopped.
    Stopped,

    /// Nodes are being started.
    Starting,

    /// Resources are being torn down.
    Deleting,

    /// A resource transition failed.
    Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Sandbox {
    /// Builds a fresh record in the `creating` state from a template.
    ///
    /// `cidrs` holds the resolved CIDR of every network, in template order.
    pub fn from_template(
        name: impl Into<String>,
        template: &Template,
        cidrs: &[Ipv4Network],
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            template: template.get_name().clone(),
            status: SandboxStatus::Creating,
            created_at: now,
            modified_at: now,
            last_error: None,
            networks: template
                .get_networks()
                .iter()
                .zip(cidrs)
                .map(|(def, cidr)| Network::from_def(def, *cidr))
                .collect(),
            nodes: template.get_nodes().iter().map(Node::from_def).collect(),
        }
    }

    /// Decodes a record from its JSON form.
    pub fn from_json(name: &str, data: &[u8]) -> TopoboxResult<Self> {
        let sandbox: Sandbox =
            serde_json::from_slice(data).map_err(|e| TopoboxError::CorruptedRecord {
                sandbox: name.to_string(),
                reason: e.to_string(),
            })?;

        if sandbox.name != name {
            return Err(TopoboxError::CorruptedRecord {
                sandbox: name.to_string(),
                reason: format!("record is named '{}'", sandbox.name),
            });
        }

        Ok(sandbox)
    }

    /// Encodes the record as pretty JSON.
    pub fn to_json(&self) -> TopoboxResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Gets a network by name.
    pub fn get_network(&self, name: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.name == name)
    }

    /// Gets a node by name.
    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Returns `true` if every network and node is active.
    pub fn all_active(&self) -> bool {
        self.networks
            .iter()
            .all(|n| n.status == ResourceStatus::Active)
            && self.nodes.iter().all(|n| n.status == ResourceStatus::Active)
    }

    /// Returns `true` if every network and node has been torn down.
    pub fn all_deleted(&self) -> bool {
        self.networks
            .iter()
            .all(|n| n.status == ResourceStatus::Deleted)
            && self.nodes.iter().all(|n| n.status == ResourceStatus::Deleted)
    }

    /// The status a finished create or start settles on.
    pub fn settled_status(&self) -> SandboxStatus {
        if self.all_active() {
            SandboxStatus::Active
        } else {
            SandboxStatus::Error
        }
    }

    /// Sets the status and bumps the modification time.
    pub(crate) fn set_status(&mut self, status: SandboxStatus) {
        self.status = status;
        self.touch();
    }

    /// Bumps the modification time.
    pub(crate) fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Returns the handles of the networks a node attaches to, in interface order.
    ///
    /// Networks without a handle are skipped.
    pub(crate) fn attached_handles(&self, node: &Node) -> Vec<NetworkHandle> {
        node.networks
            .iter()
            .filter_map(|name| self.get_network(name))
            .filter_map(|network| network.handle.clone())
            .collect()
    }
}

impl Network {
    fn from_def(def: &NetworkDef, cidr: Ipv4Network) -> Self {
        Self {
            name: def.get_name().clone(),
            cidr,
            status: ResourceStatus::Pending,
            handle: None,
        }
    }
}

impl Node {
    fn from_def(def: &NodeDef) -> Self {
        Self {
            name: def.get_name().clone(),
            services: def.get_services().clone(),
            networks: def.get_networks().clone(),
            image: def.get_image().clone(),
            cpus: def.get_cpus().unwrap_or(DEFAULT_NUM_VCPUS),
            ram_mib: def.get_ram_mib().unwrap_or(DEFAULT_RAM_MIB),
            status: ResourceStatus::Pending,
            handle: None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            ResourceStatus::Pending => "pending",
            ResourceStatus::Active => "active",
            ResourceStatus::Stopped => "stopped",
            ResourceStatus::Error => "error",
            ResourceStatus::Deleted => "deleted",
        };
        write!(f, "{status}")
    }
}

impl Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            SandboxStatus::Creating => "creating",
            SandboxStatus::Active => "active",
            SandboxStatus::Stopping => "stopping",
            SandboxStatus::Stopped => "stopped",
            SandboxStatus::Starting => "starting",
            SandboxStatus::Deleting => "deleting",
            SandboxStatus::Error => "error",
        };
        write!(f, "{status}")
    }
}

impl FromStr for SandboxStatus {
    type Err = TopoboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creating" => Ok(SandboxStatus::Creating),
            "active" => Ok(SandboxStatus::Active),
            "stopping" => Ok(SandboxStatus::Stopping),
            "stopped" => Ok(SandboxStatus::Stopped),
            "starting" => Ok(SandboxStatus::Starting),
            "deleting" => Ok(SandboxStatus::Deleting),
            "error" => Ok(SandboxStatus::Error),
            _ => Err(TopoboxError::custom(anyhow::anyhow!(
                "unknown sandbox status '{s}'"
            ))),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Template {
        Template::from_yaml(
            "T1",
            r#"
            networks:
              - name: net-a
                cidr: 10.0.0.0/24
            nodes:
              - name: node-1
                services: [web]
                networks: [net-a]
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_sandbox_from_template() {
        let cidr = "10.0.0.0/24".parse().unwrap();
        let sandbox = Sandbox::from_template("sb1", &template(), &[cidr]);

        assert_eq!(sandbox.get_name(), "sb1");
        assert_eq!(sandbox.get_template(), "T1");
        assert_eq!(*sandbox.get_status(), SandboxStatus::Creating);
        assert_eq!(sandbox.get_networks().len(), 1);
        assert_eq!(*sandbox.get_networks()[0].get_status(), ResourceStatus::Pending);

        let node = sandbox.get_node("node-1").unwrap();
        assert_eq!(*node.get_cpus(), DEFAULT_NUM_VCPUS);
        assert_eq!(*node.get_ram_mib(), DEFAULT_RAM_MIB);
        assert!(node.get_services().contains("web"));
        assert_eq!(sandbox.settled_status(), SandboxStatus::Error);
    }

    #[test]
    fn test_sandbox_json_uses_lowercase_statuses() {
        let cidr = "10.0.0.0/24".parse().unwrap();
        let sandbox = Sandbox::from_template("sb1", &template(), &[cidr]);
        let json = String::from_utf8(sandbox.to_json().unwrap()).unwrap();

        assert!(json.contains(r#""status": "creating""#));
        assert!(json.contains(r#""status": "pending""#));
        assert!(json.contains(r#""cidr": "10.0.0.0/24""#));
    }

    #[test]
    fn test_sandbox_from_json_rejects_garbage_and_mismatched_names() {
        assert!(matches!(
            Sandbox::from_json("sb1", b"{\"name\": "),
            Err(TopoboxError::CorruptedRecord { .. })
        ));

        let cidr = "10.0.0.0/24".parse().unwrap();
        let data = Sandbox::from_template("sb1", &template(), &[cidr])
            .to_json()
            .unwrap();
        assert!(Sandbox::from_json("sb1", &data).is_ok());
        assert!(matches!(
            Sandbox::from_json("other", &data),
            Err(TopoboxError::CorruptedRecord { reason, .. }) if reason.contains("sb1")
        ));
    }

    #[test]
    fn test_sandbox_status_parses() {
        assert_eq!("stopped".parse::<SandboxStatus>().unwrap(), SandboxStatus::Stopped);
        assert!("running".parse::<SandboxStatus>().is_err());
    }
}
