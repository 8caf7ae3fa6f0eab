use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::SandboxStatus;

use super::styles;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// topobox - Ephemeral multi-node sandboxes of virtual networks and nodes
#[derive(Debug, Parser)]
#[command(name = "topobox", author, about, version, styles=styles::styles())]
pub struct TopoboxArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: Option<TopoboxSubcommand>,

    /// The home directory holding sandbox records and templates
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum TopoboxSubcommand {
    /// Initialize the home directory and install the starter templates
    #[command(name = "setup")]
    Setup,

    /// Manage sandboxes
    #[command(name = "sandbox")]
    Sandbox {
        /// The sandbox subcommand to run
        #[command(subcommand)]
        subcommand: SandboxSubcommand,
    },

    /// Inspect templates
    #[command(name = "template")]
    Template {
        /// The template subcommand to run
        #[command(subcommand)]
        subcommand: TemplateSubcommand,
    },

    /// Inspect base images
    #[command(name = "image")]
    Image {
        /// The image subcommand to run
        #[command(subcommand)]
        subcommand: ImageSubcommand,
    },
}

/// Sandbox subcommands
#[derive(Debug, Subcommand)]
pub enum SandboxSubcommand {
    /// List sandboxes
    #[command(name = "list")]
    List {
        /// Only list sandboxes in this status
        #[arg(long, value_name = "STATUS")]
        status: Option<SandboxStatus>,

        /// Only list sandboxes created from this template
        #[arg(long, value_name = "TEMPLATE")]
        template: Option<String>,
    },

    /// Show the networks and nodes of a sandbox
    #[command(name = "show")]
    Show {
        /// Name of the sandbox
        name: String,
    },

    /// Create a sandbox from a template
    #[command(name = "create")]
    Create {
        /// Name of the sandbox
        name: String,

        /// Template to instantiate
        #[arg(short, long)]
        template: String,
    },

    /// Tear down a sandbox and remove its record
    #[command(name = "delete")]
    Delete {
        /// Name of the sandbox
        name: String,

        /// Ignore teardown failures and remove the record regardless
        #[arg(short, long)]
        force: bool,
    },

    /// Start the nodes of a sandbox
    #[command(name = "start")]
    Start {
        /// Name of the sandbox
        name: String,
    },

    /// Stop the nodes of a sandbox
    #[command(name = "stop")]
    Stop {
        /// Name of the sandbox
        name: String,
    },
}

/// Template subcommands
#[derive(Debug, Subcommand)]
pub enum TemplateSubcommand {
    /// List templates
    #[command(name = "list")]
    List,

    /// Show the definition of a template
    #[command(name = "show")]
    Show {
        /// Name of the template
        name: String,
    },
}

/// Image subcommands
#[derive(Debug, Subcommand)]
pub enum ImageSubcommand {
    /// List the base images nodes can boot from
    #[command(name = "list")]
    List,
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args_are_consistent() {
        TopoboxArgs::command().debug_assert();
    }

    #[test]
    fn test_args_parse_sandbox_commands() {
        let args = TopoboxArgs::parse_from([
            "topobox", "--home", "/tmp/h", "sandbox", "delete", "sb1", "-f",
        ]);
        assert_eq!(args.home, Some(PathBuf::from("/tmp/h")));
        assert!(matches!(
            args.subcommand,
            Some(TopoboxSubcommand::Sandbox {
                subcommand: SandboxSubcommand::Delete { ref name, force: true }
            }) if name == "sb1"
        ));

        let args = TopoboxArgs::parse_from([
            "topobox", "sandbox", "list", "--status", "stopped", "-v",
        ]);
        assert!(args.verbose);
        assert!(matches!(
            args.subcommand,
            Some(TopoboxSubcommand::Sandbox {
                subcommand: SandboxSubcommand::List {
                    status: Some(SandboxStatus::Stopped),
                    template: None,
                }
            })
        ));

        let args = TopoboxArgs::parse_from(["topobox", "image", "list"]);
        assert!(matches!(
            args.subcommand,
            Some(TopoboxSubcommand::Image {
                subcommand: ImageSubcommand::List
            })
        ));

        assert!(TopoboxArgs::try_parse_from(["topobox", "sandbox", "list", "--status", "up"]).is_err());
        assert!(TopoboxArgs::try_parse_from(["topobox", "sandbox", "create", "sb1"]).is_err());
    }
}
