use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{
    models::{Network, Node},
    provision::{NetworkHandle, NodeHandle, ProvisioningGateway},
    ProvisionResult, ProvisioningError, ResourceKind, TopoboxError, TopoboxResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A provisioning backend that delegates every call to an external provisioner executable.
///
/// Each gateway call becomes one invocation of the provisioner:
///
/// ```text
/// <prov> network create --sandbox S --name N --cidr C
/// <prov> network delete --handle H
/// <prov> node create --sandbox S --name N --cpus C --ram-mib R [--image I] [--service X]... [--network H]...
/// <prov> node start --handle H
/// <prov> node stop --handle H
/// <prov> node delete --handle H
/// ```
///
/// The handle of a created resource is the trimmed standard output of the `create` call, or
/// `S-N` when the provisioner prints nothing. A non-zero exit status, a failure to spawn, or a
/// call exceeding the timeout is reported as a [`ProvisioningError`] carrying the standard error
/// of the provisioner.
#[derive(Debug, Clone)]
pub struct CommandGateway {
    program: String,
    leading_args: Vec<String>,
    timeout: Duration,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CommandGateway {
    /// Creates a gateway from a command vector: the program followed by any leading arguments.
    pub fn new(command: Vec<String>, timeout: Duration) -> TopoboxResult<Self> {
        let mut command = command.into_iter();
        let program = command
            .next()
            .filter(|program| !program.is_empty())
            .ok_or(TopoboxError::ProvisionerNotConfigured)?;

        Ok(Self {
            program,
            leading_args: command.collect(),
            timeout,
        })
    }

    /// Runs the provisioner with `args` and returns its trimmed standard output.
    async fn run(&self, kind: ResourceKind, name: &str, args: &[String]) -> ProvisionResult<String> {
        tracing::debug!(
            "running provisioner: {} {} {}",
            self.program,
            self.leading_args.join(" "),
            args.join(" ")
        );

        let child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProvisioningError::new(
                    kind,
                    name,
                    format!("failed to spawn provisioner '{}': {e}", self.program),
                )
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProvisioningError::new(
                    kind,
                    name,
                    format!("provisioner failed: {e}"),
                ))
            }
            Err(_) => {
                return Err(ProvisioningError::new(
                    kind,
                    name,
                    format!("provisioner timed out after {}s", self.timeout.as_secs()),
                ))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let cause = if stderr.is_empty() {
                format!("provisioner exited with {}", output.status)
            } else {
                stderr
            };

            return Err(ProvisioningError::new(kind, name, cause));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

fn handle_or_default(stdout: String, sandbox: &str, name: &str) -> String {
    if stdout.is_empty() {
        format!("{sandbox}-{name}")
    } else {
        stdout
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ProvisioningGateway for CommandGateway {
    async fn provision_network(
        &self,
        sandbox: &str,
        network: &Network,
    ) -> ProvisionResult<NetworkHandle> {
        let cidr = network.cidr.to_string();
        let stdout = self
            .run(
                ResourceKind::Network,
                &network.name,
                &args([
                    "network",
                    "create",
                    "--sandbox",
                    sandbox,
                    "--name",
                    &network.name,
                    "--cidr",
                    &cidr,
                ]),
            )
            .await?;

        Ok(NetworkHandle::new(handle_or_default(
            stdout,
            sandbox,
            &network.name,
        )))
    }

    async fn teardown_network(
        &self,
        network: &Network,
        handle: &NetworkHandle,
    ) -> ProvisionResult<()> {
        self.run(
            ResourceKind::Network,
            &network.name,
            &args(["network", "delete", "--handle", handle.id()]),
        )
        .await?;

        Ok(())
    }

    async fn provision_node(
        &self,
        sandbox: &str,
        node: &Node,
        attached: &[NetworkHandle],
    ) -> ProvisionResult<NodeHandle> {
        let mut call = args([
            "node",
            "create",
            "--sandbox",
            sandbox,
            "--name",
            &node.name,
            "--cpus",
            &node.cpus.to_string(),
            "--ram-mib",
            &node.ram_mib.to_string(),
        ]);

        if let Some(image) = &node.image {
            call.extend(args(["--image", image]));
        }

        for service in &node.services {
            call.extend(args(["--service", service]));
        }

        for network in attached {
            call.extend(args(["--network", network.id()]));
        }

        let stdout = self.run(ResourceKind::Node, &node.name, &call).await?;
        Ok(NodeHandle::new(handle_or_default(stdout, sandbox, &node.name)))
    }

    async fn teardown_node(&self, node: &Node, handle: &NodeHandle) -> ProvisionResult<()> {
        self.run(
            ResourceKind::Node,
            &node.name,
            &args(["node", "delete", "--handle", handle.id()]),
        )
        .await?;

        Ok(())
    }

    async fn start_node(&self, node: &Node, handle: &NodeHandle) -> ProvisionResult<()> {
        self.run(
            ResourceKind::Node,
            &node.name,
            &args(["node", "start", "--handle", handle.id()]),
        )
        .await?;

        Ok(())
    }

    async fn stop_node(&self, node: &Node, handle: &NodeHandle) -> ProvisionResult<()> {
        self.run(
            ResourceKind::Node,
            &node.name,
            &args(["node", "stop", "--handle", handle.id()]),
        )
        .await?;

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
