//! `topobox` manages ephemeral, multi-node test environments called sandboxes.
//!
//! # Overview
//!
//! A sandbox is a named, host-local collection of virtual networks and nodes instantiated from a
//! reusable template. topobox handles:
//! - Template loading and validation
//! - Sandbox lifecycle (create, start, stop, delete)
//! - Durable, atomically replaced state records
//! - Best-effort teardown when a backend misbehaves
//!
//! # Architecture
//!
//! - **Templates**: named network and node definitions read from the home directory
//! - **State**: one record per sandbox, written with write-then-rename discipline
//! - **Provisioning**: the [`provision::ProvisioningGateway`] boundary to the real backend
//! - **Orchestration**: the lifecycle state machine driving the gateway in dependency order
//! - **Registry**: enumeration of known sandboxes
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use topobox::{
//!     management::{StateStore, TemplateStore},
//!     orchestration::{DeleteMode, Orchestrator},
//!     provision::MemoryGateway,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let home = std::path::Path::new("/path/to/home");
//!     let orchestrator = Orchestrator::new(
//!         TemplateStore::new(home.join("templates")),
//!         StateStore::new(home),
//!         MemoryGateway::new(),
//!     );
//!
//!     orchestrator.create("sb1", "all-in-one").await?;
//!     orchestrator.stop("sb1").await?;
//!     orchestrator.delete("sb1", DeleteMode::Strict).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Templates, settings and defaults
//! - [`management`] - Template store, state store, registry and home setup
//! - [`models`] - Sandbox, network and node records
//! - [`orchestration`] - Sandbox lifecycle state machine
//! - [`provision`] - Provisioning gateway trait and backends
//! - [`utils`] - Common utilities and helpers

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod config;
pub mod management;
pub mod models;
pub mod orchestration;
pub mod provision;
pub mod utils;

pub use error::*;
