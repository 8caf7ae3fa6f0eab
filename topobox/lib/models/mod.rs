//! Sandbox records and their resources.

mod sandbox;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use sandbox::*;
