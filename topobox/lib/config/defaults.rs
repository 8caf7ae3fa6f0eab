use std::{net::Ipv4Addr, path::PathBuf, sync::LazyLock};

use ipnetwork::Ipv4Network;

use crate::utils::TOPOBOX_HOME_DIR;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The default number of vCPUs given to a node.
pub const DEFAULT_NUM_VCPUS: u8 = 1;

/// The default amount of RAM in MiB given to a node.
pub const DEFAULT_RAM_MIB: u32 = 1024;

/// The default prefix length of an automatically allocated network.
pub const DEFAULT_SUBNET_PREFIX: u8 = 28;

/// The default number of seconds a single provisioner call may take.
pub const DEFAULT_PROVISIONER_TIMEOUT_SECS: u64 = 300;

/// The path where all topobox state is stored.
pub static DEFAULT_TOPOBOX_HOME: LazyLock<PathBuf> = LazyLock::new(|| {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(TOPOBOX_HOME_DIR)
});

/// The pool automatically allocated networks are carved from.
pub static DEFAULT_SUBNET_POOL: LazyLock<Ipv4Network> = LazyLock::new(|| {
    Ipv4Network::new(Ipv4Addr::new(10, 10, 0, 0), 16).expect("10.10.0.0/16 is a valid network")
});
