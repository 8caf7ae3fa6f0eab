//! Configuration types and helpers.

mod defaults;
mod settings;
mod starters;
mod template;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use settings::*;
pub use starters::*;
pub use template::*;
