//! Template definitions.
//!
//! A template is an immutable, named description of the networks and nodes a sandbox is built
//! from. Templates are stored as YAML, one file per template, keyed by file stem:
//!
//! ```yaml
//! description: A web node on a private network
//! networks:
//!   - name: net-a
//!     cidr: 10.0.0.0/24
//! nodes:
//!   - name: node-1
//!     services: [web]
//!     networks: [net-a]
//! ```

use std::collections::{BTreeSet, HashSet};

use getset::Getters;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{TopoboxError, TopoboxResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A reusable topology definition.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Template {
    /// The name of the template. Taken from the file it was loaded from.
    #[serde(skip)]
    #[builder(setter(into))]
    pub(crate) name: String,

    /// A human readable description.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default, setter(strip_option, into))]
    pub(crate) description: Option<String>,

    /// The networks, in provisioning order.
    #[serde(default)]
    #[builder(default)]
    pub(crate) networks: Vec<NetworkDef>,

    /// The nodes, in provisioning order.
    #[serde(default)]
    #[builder(default)]
    pub(crate) nodes: Vec<NodeDef>,
}

/// A network definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct NetworkDef {
    /// The name of the network, unique within the template.
    #[builder(setter(into))]
    pub(crate) name: String,

    /// The CIDR of the network. Allocated from the subnet pool when absent.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default, setter(strip_option))]
    pub(crate) cidr: Option<Ipv4Network>,
}

/// A node definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct NodeDef {
    /// The name of the node, unique within the template.
    #[builder(setter(into))]
    pub(crate) name: String,

    /// The services the node runs.
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    #[builder(default)]
    pub(crate) services: BTreeSet<String>,

    /// The networks the node attaches to, in interface order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    #[builder(default)]
    pub(crate) networks: Vec<String>,

    /// The base image of the node.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default, setter(strip_option, into))]
    pub(crate) image: Option<String>,

    /// The number of vCPUs.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default, setter(strip_option))]
    pub(crate) cpus: Option<u8>,

    /// The amount of RAM in MiB.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[builder(default, setter(strip_option))]
    pub(crate) ram_mib: Option<u32>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Template {
    /// Parses a template from YAML, naming it `name`, and validates it.
    pub fn from_yaml(name: impl Into<String>, yaml: &str) -> TopoboxResult<Self> {
        let name = name.into();
        let mut template: Template =
            serde_yaml::from_str(yaml).map_err(|e| TopoboxError::TemplateInvalid {
                template: name.clone(),
                reason: e.to_string(),
            })?;

        template.name = name;
        template.validate()?;

        Ok(template)
    }

    /// Serializes the template to YAML.
    pub fn to_yaml(&self) -> TopoboxResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Gets a network definition by name.
    pub fn get_network(&self, name: &str) -> Option<&NetworkDef> {
        self.networks.iter().find(|n| n.name == name)
    }

    /// Gets a node definition by name.
    pub fn get_node(&self, name: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Checks that the template describes a consistent topology.
    ///
    /// Network and node names must be unique and non-empty, declared CIDRs must not overlap, and
    /// every node may only attach to networks defined in the same template, each at most once.
    pub fn validate(&self) -> TopoboxResult<()> {
        let invalid = |reason: String| TopoboxError::TemplateInvalid {
            template: self.name.clone(),
            reason,
        };

        let mut network_names = HashSet::new();
        for network in &self.networks {
            if network.name.is_empty() {
                return Err(invalid("network name cannot be empty".to_string()));
            }

            if !network_names.insert(network.name.as_str()) {
                return Err(invalid(format!("duplicate network '{}'", network.name)));
            }
        }

        let declared: Vec<_> = self
            .networks
            .iter()
            .filter_map(|n| n.cidr.map(|cidr| (n, cidr)))
            .collect();
        for (i, (a, a_cidr)) in declared.iter().enumerate() {
            for (b, b_cidr) in &declared[i + 1..] {
                if a_cidr.contains(b_cidr.network()) || b_cidr.contains(a_cidr.network()) {
                    return Err(invalid(format!(
                        "networks '{}' ({}) and '{}' ({}) overlap",
                        a.name, a_cidr, b.name, b_cidr
                    )));
                }
            }
        }

        let mut node_names = HashSet::new();
        for node in &self.nodes {
            if node.name.is_empty() {
                return Err(invalid("node name cannot be empty".to_string()));
            }

            if !node_names.insert(node.name.as_str()) {
                return Err(invalid(format!("duplicate node '{}'", node.name)));
            }

            let mut attached = HashSet::new();
            for network in &node.networks {
                if !network_names.contains(network.as_str()) {
                    return Err(invalid(format!(
                        "node '{}' references undefined network '{}'",
                        node.name, network
                    )));
                }

                if !attached.insert(network.as_str()) {
                    return Err(invalid(format!(
                        "node '{}' attaches to network '{}' more than once",
                        node.name, network
                    )));
                }
            }
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
