use std::{path::Path, time::Duration};

use topobox::{
    cli::{self, AnsiStyles},
    config::{Settings, Template},
    management::{self, ImageStore, SandboxFilter, SandboxRegistry, StateStore, TemplateStore},
    models::{Sandbox, SandboxStatus},
    orchestration::{self, DeleteMode, Orchestrator, SubnetPool},
    provision::CommandGateway,
    utils::{IMAGES_SUBDIR, TEMPLATES_SUBDIR},
    TopoboxError, TopoboxResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const NONE_PLACEHOLDER: &str = "-";

//--------------------------------------------------------------------------------------------------
// Functions: Handlers
//--------------------------------------------------------------------------------------------------

pub async fn setup_subcommand(home: &Path) -> TopoboxResult<()> {
    let installed = management::initialize(home).await?;
    println!("initialized topobox home at {}", home.display().to_string().literal());
    for name in installed {
        println!("installed template {}", name.literal());
    }

    Ok(())
}

pub async fn sandbox_list_subcommand(
    home: &Path,
    status: Option<SandboxStatus>,
    template: Option<String>,
) -> TopoboxResult<()> {
    management::ensure_home(home).await?;

    let registry = SandboxRegistry::new(StateStore::new(home));
    let filter = SandboxFilter { status, template };
    let sandboxes = registry.list(&filter).await?;

    print_row(&["NAME", "TEMPLATE", "STATUS", "NETWORKS", "NODES"], true);
    for sandbox in &sandboxes {
        print_row(
            &[
                sandbox.get_name(),
                sandbox.get_template(),
                &sandbox.get_status().to_string(),
                &sandbox.get_networks().len().to_string(),
                &sandbox.get_nodes().len().to_string(),
            ],
            false,
        );
    }

    Ok(())
}

pub async fn sandbox_show_subcommand(home: &Path, name: &str) -> TopoboxResult<()> {
    management::ensure_home(home).await?;

    let registry = SandboxRegistry::new(StateStore::new(home));
    let sandbox = registry.show(name).await?;
    print_sandbox(&sandbox);

    Ok(())
}

pub async fn sandbox_create_subcommand(home: &Path, name: &str, template: &str) -> TopoboxResult<()> {
    management::ensure_home(home).await?;

    let orchestrator = orchestrator(home).await?;
    let sandbox = orchestrator.create(name, template).await?;
    print_sandbox(&sandbox);

    Ok(())
}

pub async fn sandbox_delete_subcommand(home: &Path, name: &str, force: bool) -> TopoboxResult<()> {
    management::ensure_home(home).await?;

    if !force {
        let orchestrator = orchestrator(home).await?;
        orchestrator.delete(name, DeleteMode::Strict).await?;
    } else {
        // Forgetting a sandbox must not depend on reaching its backend.
        match orchestrator(home).await {
            Ok(orchestrator) => orchestrator.delete(name, DeleteMode::Force).await?,
            Err(e) => {
                tracing::warn!("{}, removing sandbox {} without teardown", e, name);
                orchestration::force_delete(&StateStore::new(home), name).await?;
            }
        }
    }
    println!("sandbox {} deleted", name.literal());

    Ok(())
}

pub async fn sandbox_start_subcommand(home: &Path, name: &str) -> TopoboxResult<()> {
    management::ensure_home(home).await?;

    let orchestrator = orchestrator(home).await?;
    let sandbox = orchestrator.start(name).await?;
    println!(
        "sandbox {} is {}",
        name.literal(),
        cli::status(*sandbox.get_status())
    );

    Ok(())
}

pub async fn sandbox_stop_subcommand(home: &Path, name: &str) -> TopoboxResult<()> {
    management::ensure_home(home).await?;

    let orchestrator = orchestrator(home).await?;
    let sandbox = orchestrator.stop(name).await?;
    println!(
        "sandbox {} is {}",
        name.literal(),
        cli::status(*sandbox.get_status())
    );

    Ok(())
}

pub async fn template_list_subcommand(home: &Path) -> TopoboxResult<()> {
    management::ensure_home(home).await?;

    let templates = TemplateStore::new(home.join(TEMPLATES_SUBDIR)).list().await?;
    print_row(&["NAME", "NETWORKS", "NODES", "DESCRIPTION"], true);
    for template in &templates {
        print_row(
            &[
                template.get_name(),
                &template.get_networks().len().to_string(),
                &template.get_nodes().len().to_string(),
                template.get_description().as_deref().unwrap_or(NONE_PLACEHOLDER),
            ],
            false,
        );
    }

    Ok(())
}

pub async fn template_show_subcommand(home: &Path, name: &str) -> TopoboxResult<()> {
    management::ensure_home(home).await?;

    let template: Template = TemplateStore::new(home.join(TEMPLATES_SUBDIR))
        .resolve(name)
        .await?;
    println!("{}", format!("# {}", template.get_name()).header());
    print!("{}", template.to_yaml()?);

    Ok(())
}

pub async fn image_list_subcommand(home: &Path) -> TopoboxResult<()> {
    management::ensure_home(home).await?;

    let images = ImageStore::new(home.join(IMAGES_SUBDIR)).list().await?;
    print_row(&["NAME", "FORMAT", "VIRTUAL SIZE", "DISK SIZE"], true);
    for image in &images {
        print_row(
            &[
                image.get_name(),
                image.get_format(),
                &human_bytes(*image.get_virtual_size()),
                &human_bytes(*image.get_disk_size()),
            ],
            false,
        );
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Builds an orchestrator driving the configured provisioner.
async fn orchestrator(home: &Path) -> TopoboxResult<Orchestrator<CommandGateway>> {
    let settings = Settings::load(home).await?;
    let command = settings
        .provisioner_command()
        .ok_or(TopoboxError::ProvisionerNotConfigured)?;

    let gateway = CommandGateway::new(
        command,
        Duration::from_secs(*settings.get_provisioner_timeout_secs()),
    )?;
    let subnets = SubnetPool::new(*settings.get_subnet_pool(), *settings.get_subnet_prefix())?;

    Ok(Orchestrator::new(
        TemplateStore::new(home.join(TEMPLATES_SUBDIR)),
        StateStore::new(home),
        gateway,
    )
    .with_subnet_pool(subnets)
    .with_image_store(ImageStore::new(home.join(IMAGES_SUBDIR))))
}

fn print_sandbox(sandbox: &Sandbox) {
    println!("{:<10} {}", "name:".header(), sandbox.get_name().literal());
    println!("{:<10} {}", "template:".header(), sandbox.get_template());
    println!("{:<10} {}", "status:".header(), cli::status(*sandbox.get_status()));
    println!(
        "{:<10} {}",
        "created:".header(),
        sandbox.get_created_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "{:<10} {}",
        "modified:".header(),
        sandbox.get_modified_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(error) = sandbox.get_last_error() {
        println!("{:<10} {}", "error:".header(), error.error());
    }

    println!();
    print_row(&["NETWORK", "CIDR", "STATUS"], true);
    for network in sandbox.get_networks() {
        print_row(
            &[
                network.get_name(),
                &network.get_cidr().to_string(),
                &network.get_status().to_string(),
            ],
            false,
        );
    }

    println!();
    print_row(&["NODE", "STATUS", "SERVICES", "NETWORKS"], true);
    for node in sandbox.get_nodes() {
        let services = node.get_services().iter().cloned().collect::<Vec<_>>();
        print_row(
            &[
                node.get_name(),
                &node.get_status().to_string(),
                &join_or_placeholder(&services),
                &join_or_placeholder(node.get_networks()),
            ],
            false,
        );
    }
}

fn print_row(columns: &[&str], header: bool) {
    let line = columns
        .iter()
        .map(|column| format!("{column:<20}"))
        .collect::<Vec<_>>()
        .join(" ");
    let line = line.trim_end();

    if header {
        println!("{}", line.header());
    } else {
        println!("{line}");
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn join_or_placeholder(items: &[String]) -> String {
    if items.is_empty() {
        NONE_PLACEHOLDER.placeholder()
    } else {
        items.join(",")
    }
}
