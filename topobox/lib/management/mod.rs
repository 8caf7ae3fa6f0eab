//! Management components: persisted templates and sandbox records, locking, and the home
//! directory they live in.

mod home;
mod image_store;
mod lock;
mod registry;
mod state_store;
mod template_store;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use home::*;
pub use image_store::*;
pub use lock::*;
pub use registry::*;
pub use state_store::*;
pub use template_store::*;
