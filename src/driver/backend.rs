//! Collaborator traits and common types.
//!
//! The orchestrator never talks to docker or the OS directly. It goes through
//! [`ContainerEngine`] and [`ProcessRuntime`], which lets tests swap in
//! in-memory fakes.

use crate::config::{PortBinding, ServiceSpec, VolumeSpec};
use crate::error::{KumiageError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A named volume mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Engine volume name.
    pub volume: String,
    /// Mount point inside the container.
    pub target: String,
    /// Whether the mount is read-only.
    pub read_only: bool,
}

/// Everything the engine needs to create a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Container name, also used as hostname.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Entrypoint override.
    pub entrypoint: Option<String>,
    /// Extra command arguments.
    pub command: Vec<String>,
    /// Environment entries (KEY=VALUE).
    pub env: Vec<String>,
    /// Volume mounts.
    pub mounts: Vec<VolumeMount>,
    /// Published ports, bound on 0.0.0.0.
    pub ports: Vec<PortBinding>,
    /// Restart policy in engine form.
    pub restart: Option<String>,
}

impl ContainerConfig {
    /// Builds a container definition for a service.
    ///
    /// Volume sources are resolved through `volumes`, the map from source key
    /// to engine volume name. Every source must already have a volume.
    pub fn for_service(
        name: &str,
        spec: &ServiceSpec,
        volumes: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let image = spec
            .image
            .clone()
            .ok_or_else(|| KumiageError::config(format!("services.{}.image is required", name)))?;

        let mounts = spec
            .volume_specs()?
            .into_iter()
            .map(|VolumeSpec { source, target, read_only }| {
                let volume = volumes.get(&source).cloned().ok_or_else(|| {
                    KumiageError::engine(format!(
                        "No volume registered for source '{}' of service '{}'",
                        source, name
                    ))
                })?;
                Ok(VolumeMount {
                    volume,
                    target,
                    read_only,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            image,
            entrypoint: spec.entrypoint.clone(),
            command: spec.command_argv()?,
            env: spec.env.clone(),
            mounts,
            ports: spec.port_bindings()?,
            restart: spec.restart.as_ref().map(|r| r.engine_value()),
        })
    }
}

/// Container engine operations.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Returns the name of this engine.
    fn name(&self) -> &'static str;

    /// Looks up a network by name or id. `None` when it does not exist.
    async fn inspect_network(&self, network: &str) -> Result<Option<String>>;

    /// Creates an attachable network and returns its id.
    async fn create_network(&self, name: &str) -> Result<String>;

    /// Removes a network.
    async fn remove_network(&self, id: &str) -> Result<()>;

    /// Creates a local volume and returns its name.
    async fn create_volume(&self) -> Result<String>;

    /// Removes a volume.
    async fn remove_volume(&self, name: &str) -> Result<()>;

    /// Pulls an image.
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Creates a container and returns its id.
    ///
    /// Fails with [`KumiageError::ImageNotFound`] when the image is not
    /// present locally.
    async fn create_container(&self, config: &ContainerConfig) -> Result<String>;

    /// Attaches a container to a network.
    async fn connect_network(&self, network: &str, container: &str) -> Result<()>;

    /// Starts a container.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Stops a container, killing it after `grace`.
    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()>;

    /// Sends a signal to a container.
    async fn kill_container(&self, id: &str, signal: &str) -> Result<()>;

    /// Removes a container.
    async fn remove_container(&self, id: &str) -> Result<()>;
}

/// Local OS process operations.
#[async_trait]
pub trait ProcessRuntime: Send + Sync {
    /// Spawns `argv` with extra environment entries and returns its PID.
    async fn spawn(&self, argv: &[String], env: &[String]) -> Result<u32>;

    /// Whether a process with this PID exists.
    fn is_alive(&self, pid: u32) -> bool;

    /// Sends a named signal (e.g. `SIGTERM`) to a process.
    fn signal(&self, pid: u32, signal: &str) -> Result<()>;

    /// Runs a command to completion. Fails on a non-zero exit.
    async fn run(&self, argv: &[String]) -> Result<()>;
}
