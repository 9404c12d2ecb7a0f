//! Docker engine driven through the `docker` CLI.
//!
//! Every engine call is one `docker` subprocess with a timeout. Identifiers
//! are read from stdout and failures are mapped from stderr.

use crate::config::EngineConfig;
use crate::driver::backend::{ContainerConfig, ContainerEngine};
use crate::error::{KumiageError, Result};
use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Container engine backed by the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    bin: String,
    command_timeout: Duration,
}

impl DockerEngine {
    /// Creates an engine from configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            bin: config.docker_bin.clone(),
            command_timeout: config.command_timeout(),
        }
    }

    /// Runs a docker command with a timeout, returning raw output.
    async fn run(&self, args: &[String], limit: Duration) -> Result<Output> {
        let cmd_str = format!("{} {}", self.bin, args.join(" "));
        debug!(command = %cmd_str, "Executing engine command");

        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = timeout(limit, cmd.output())
            .await
            .map_err(|_| KumiageError::Timeout {
                operation: cmd_str.clone(),
                seconds: limit.as_secs(),
            })?
            .map_err(|e| {
                KumiageError::engine_with_source(format!("Failed to execute '{}'", cmd_str), e)
            })?;

        debug!(
            command = %cmd_str,
            exit_code = output.status.code(),
            "Engine command completed"
        );
        Ok(output)
    }

    /// Runs a docker command and returns trimmed stdout when it succeeds.
    async fn run_success(&self, args: &[String]) -> Result<String> {
        let output = self.run(args, self.command_timeout).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(failure(&self.bin, args, &output))
        }
    }
}

fn failure(bin: &str, args: &[String], output: &Output) -> KumiageError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    KumiageError::engine(format!(
        "'{} {}' exited with {:?}: {}",
        bin,
        args.first().map(String::as_str).unwrap_or_default(),
        output.status.code(),
        stderr.trim()
    ))
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Builds the `docker create` argument list for a container.
pub(crate) fn create_args(config: &ContainerConfig) -> Vec<String> {
    let mut args = args([
        "create",
        "--pull",
        "never",
        "--name",
        config.name.as_str(),
        "--hostname",
        config.name.as_str(),
    ]);

    if let Some(entrypoint) = &config.entrypoint {
        args.push("--entrypoint".to_string());
        args.push(entrypoint.clone());
    }
    for env in &config.env {
        args.push("--env".to_string());
        args.push(env.clone());
    }
    for mount in &config.mounts {
        let mut value = format!("type=volume,source={},target={}", mount.volume, mount.target);
        if mount.read_only {
            value.push_str(",readonly");
        }
        args.push("--mount".to_string());
        args.push(value);
    }
    for port in &config.ports {
        args.push("--publish".to_string());
        args.push(format!("0.0.0.0:{}:{}", port.host_port, port.container_key()));
    }
    if let Some(restart) = &config.restart {
        args.push("--restart".to_string());
        args.push(restart.clone());
    }

    args.push(config.image.clone());
    args.extend(config.command.iter().cloned());
    args
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn inspect_network(&self, network: &str) -> Result<Option<String>> {
        let cmd = args(["network", "inspect", "--format", "{{.Id}}", network]);
        let output = self.run(&cmd, self.command_timeout).await?;
        if output.status.success() {
            let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(Some(id));
        }
        let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
        if stderr.contains("no such network") || stderr.contains("not found") {
            return Ok(None);
        }
        Err(failure(&self.bin, &cmd, &output))
    }

    async fn create_network(&self, name: &str) -> Result<String> {
        self.run_success(&args(["network", "create", "--attachable", name]))
            .await
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        self.run_success(&args(["network", "rm", id])).await?;
        Ok(())
    }

    async fn create_volume(&self) -> Result<String> {
        self.run_success(&args(["volume", "create", "--driver", "local"]))
            .await
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        self.run_success(&args(["volume", "rm", name])).await?;
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        self.run_success(&args(["pull", image])).await?;
        Ok(())
    }

    async fn create_container(&self, config: &ContainerConfig) -> Result<String> {
        let cmd = create_args(config);
        let output = self.run(&cmd, self.command_timeout).await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such image") || stderr.contains("Unable to find image") {
            return Err(KumiageError::ImageNotFound {
                image: config.image.clone(),
            });
        }
        Err(failure(&self.bin, &cmd, &output))
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<()> {
        self.run_success(&args(["network", "connect", network, container]))
            .await
            .map_err(|e| {
                KumiageError::engine(format!(
                    "[container: {}, network: {}] network connect failed: {}",
                    container, network, e
                ))
            })?;
        Ok(())
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.run_success(&args(["start", id])).await?;
        Ok(())
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()> {
        let grace_secs = grace.as_secs().to_string();
        let cmd = args(["stop", "--time", grace_secs.as_str(), id]);
        let output = self.run(&cmd, self.command_timeout + grace).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(failure(&self.bin, &cmd, &output))
        }
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<()> {
        self.run_success(&args(["kill", "--signal", signal, id]))
            .await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.run_success(&args(["rm", id])).await?;
        Ok(())
    }
}
