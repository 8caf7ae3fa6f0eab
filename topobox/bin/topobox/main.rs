mod handlers;

use clap::{CommandFactory, Parser};
use topobox::{
    cli::{
        ImageSubcommand, SandboxSubcommand, TemplateSubcommand, TopoboxArgs, TopoboxSubcommand,
    },
    utils, TopoboxResult,
};
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> TopoboxResult<()> {
    // Parse command line arguments
    let args = TopoboxArgs::parse();

    // Initialize tracing subscriber with EnvFilter, falling back to the verbosity flag
    let default_filter = if args.verbose { "topobox=debug" } else { "topobox=warn" };
    fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let home = utils::resolve_home(args.home);
    tracing::debug!("using home directory {}", home.display());

    match args.subcommand {
        Some(TopoboxSubcommand::Setup) => {
            handlers::setup_subcommand(&home).await?;
        }
        Some(TopoboxSubcommand::Sandbox { subcommand }) => match subcommand {
            SandboxSubcommand::List { status, template } => {
                handlers::sandbox_list_subcommand(&home, status, template).await?;
            }
            SandboxSubcommand::Show { name } => {
                handlers::sandbox_show_subcommand(&home, &name).await?;
            }
            SandboxSubcommand::Create { name, template } => {
                handlers::sandbox_create_subcommand(&home, &name, &template).await?;
            }
            SandboxSubcommand::Delete { name, force } => {
                handlers::sandbox_delete_subcommand(&home, &name, force).await?;
            }
            SandboxSubcommand::Start { name } => {
                handlers::sandbox_start_subcommand(&home, &name).await?;
            }
            SandboxSubcommand::Stop { name } => {
                handlers::sandbox_stop_subcommand(&home, &name).await?;
            }
        },
        Some(TopoboxSubcommand::Template { subcommand }) => match subcommand {
            TemplateSubcommand::List => {
                handlers::template_list_subcommand(&home).await?;
            }
            TemplateSubcommand::Show { name } => {
                handlers::template_show_subcommand(&home, &name).await?;
            }
        },
        Some(TopoboxSubcommand::Image { subcommand }) => match subcommand {
            ImageSubcommand::List => {
                handlers::image_list_subcommand(&home).await?;
            }
        },
        None => {
            TopoboxArgs::command().print_help()?;
        }
    }

    Ok(())
}
