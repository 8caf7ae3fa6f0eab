use std::{
    error::Error,
    fmt::{self, Display},
    path::PathBuf,
};
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a topobox-related operation.
pub type TopoboxResult<T> = Result<T, TopoboxError>;

/// The result of a single provisioning gateway call.
pub type ProvisionResult<T> = Result<T, ProvisioningError>;

/// An error that occurred during a topobox operation.
#[derive(pretty_error_debug::Debug, Error)]
pub enum TopoboxError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),

    /// An error that occurred while encoding or decoding a JSON record.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error that occurred while encoding or decoding YAML.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An error that occurred when a join handle returned an error.
    #[error("join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    /// No template of the given name is registered.
    #[error("no template with name '{0}' found")]
    TemplateNotFound(String),

    /// The template exists but its definition is not usable.
    #[error("template '{template}' is invalid: {reason}")]
    TemplateInvalid {
        /// The name of the template.
        template: String,

        /// What is wrong with it.
        reason: String,
    },

    /// A template of the given name already exists.
    #[error("a template with name '{0}' already exists")]
    TemplateAlreadyExists(String),

    /// No sandbox record of the given name exists.
    #[error("a sandbox with name '{0}' does not exist")]
    SandboxNotFound(String),

    /// A sandbox record of the given name already exists.
    #[error("a sandbox with name '{0}' already exists")]
    AlreadyExists(String),

    /// The persisted record of a sandbox cannot be read back.
    #[error("the record of sandbox '{sandbox}' is corrupted: {reason}")]
    CorruptedRecord {
        /// The name of the sandbox.
        sandbox: String,

        /// Why the record could not be decoded.
        reason: String,
    },

    /// A sandbox or template name that cannot be used as a record key.
    #[error("invalid name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,

        /// Why it was rejected.
        reason: String,
    },

    /// A resource failed while creating or starting a sandbox.
    #[error("sandbox '{sandbox}': {source}")]
    Provisioning {
        /// The name of the sandbox.
        sandbox: String,

        /// The underlying gateway failure.
        #[source]
        source: ProvisioningError,
    },

    /// A non-force delete left a resource behind.
    #[error("sandbox '{sandbox}' still has residual resources: {source}")]
    ResidualResources {
        /// The name of the sandbox.
        sandbox: String,

        /// The teardown failure that stopped the delete.
        #[source]
        source: ProvisioningError,
    },

    /// A stop completed but some nodes could not be stopped.
    #[error("sandbox '{sandbox}' was not fully stopped, failed nodes: {}", nodes.join(", "))]
    IncompleteStop {
        /// The name of the sandbox.
        sandbox: String,

        /// The nodes that failed to stop.
        nodes: Vec<String>,
    },

    /// A node asks for a base image that is not in the image store.
    #[error("template '{template}': node '{node}' uses image '{image}', which is not installed")]
    ImageNotFound {
        /// The name of the template.
        template: String,

        /// The node asking for the image.
        node: String,

        /// The missing image.
        image: String,
    },

    /// No free subnet is left in the pool.
    #[error("no free subnet left in pool {0}")]
    SubnetPoolExhausted(String),

    /// The home directory does not exist.
    #[error("home directory '{0}' doesn't exist, run `topobox setup` first")]
    HomeNotFound(PathBuf),

    /// The home path exists but is not a directory.
    #[error("home directory '{0}' exists but is not a directory")]
    HomeNotADirectory(PathBuf),

    /// The home directory is not writable by the current user.
    #[error("home directory '{0}' is not writable")]
    HomeNotWritable(PathBuf),

    /// No provisioner executable was configured.
    #[error("no provisioner configured, set `provisioner` in settings.yaml or TOPOBOX_PROVISIONER")]
    ProvisionerNotConfigured,
}

/// The kind of resource a provisioning call acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A virtual network.
    Network,

    /// A virtual node.
    Node,
}

/// A failure reported by the provisioning backend for a single resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} '{name}': {cause}")]
pub struct ProvisioningError {
    /// The kind of resource involved.
    pub kind: ResourceKind,

    /// The name of the resource within its sandbox.
    pub name: String,

    /// The backend's description of what went wrong.
    pub cause: String,
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl TopoboxError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> TopoboxError {
        TopoboxError::Custom(AnyError {
            error: error.into(),
        })
    }
}

impl ProvisioningError {
    /// Creates a new provisioning error.
    pub fn new(kind: ResourceKind, name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            cause: cause.into(),
        }
    }

    /// Creates a provisioning error for a network.
    pub fn network(name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(ResourceKind::Network, name, cause)
    }

    /// Creates a provisioning error for a node.
    pub fn node(name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(ResourceKind::Node, name, cause)
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Network => write!(f, "network"),
            ResourceKind::Node => write!(f, "node"),
        }
    }
}

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
