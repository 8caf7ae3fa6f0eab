//! Utility functions and types.

mod env;
mod file;
mod name;
mod path;
pub mod term;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use env::*;
pub use file::*;
pub use name::*;
pub use path::*;
