//! The sandbox lifecycle engine.
//!
//! The [`Orchestrator`] drives create, start, stop and delete across the networks and nodes of a
//! sandbox in dependency order, persisting every resource transition as it happens so that a
//! failed or interrupted operation always leaves an inspectable record behind.

mod allocate;
mod create;
mod delete;
mod orchestrator;
mod phase;
mod start;
mod stop;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use allocate::*;
pub use delete::*;
pub use orchestrator::*;
pub use phase::*;
