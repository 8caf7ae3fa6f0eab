use std::fmt::{self, Display};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A group of resources of one kind, processed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Every network of the sandbox.
    Networks,

    /// Every node of the sandbox.
    Nodes,
}

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The order phases are provisioned in. Nodes attach to networks, so networks come first.
pub const PROVISION_ORDER: [Phase; 2] = [Phase::Networks, Phase::Nodes];

/// The order phases are torn down in: the reverse of [`PROVISION_ORDER`].
pub const TEARDOWN_ORDER: [Phase; 2] = [Phase::Nodes, Phase::Networks];

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Networks => write!(f, "networks"),
            Phase::Nodes => write!(f, "nodes"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teardown_reverses_provisioning() {
        let mut reversed = PROVISION_ORDER;
        reversed.reverse();
        assert_eq!(TEARDOWN_ORDER, reversed);
        assert_eq!(PROVISION_ORDER[0], Phase::Networks);
    }
}
