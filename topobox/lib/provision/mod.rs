//! The provisioning boundary.
//!
//! The orchestrator never talks to a virtualization backend directly. Every network and node
//! transition goes through a [`ProvisioningGateway`], which is the only fallible call the
//! lifecycle engine makes besides state persistence.

mod gateway;
mod implementations;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use gateway::*;
pub use implementations::*;
