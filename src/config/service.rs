//! Service definitions.
//!
//! A [`Definition`] is the declarative document describing every service:
//! which driver runs it, what it runs, and which services it depends on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::mounts::{PortBinding, VolumeSpec};
use crate::error::{KumiageError, Result};

/// Execution mechanism of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// Managed by the container engine.
    #[default]
    #[serde(alias = "docker")]
    Container,
    /// Spawned as a local OS process.
    #[serde(alias = "exec")]
    Process,
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Driver::Container => write!(f, "container"),
            Driver::Process => write!(f, "process"),
        }
    }
}

impl FromStr for Driver {
    type Err = KumiageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "container" | "docker" => Ok(Driver::Container),
            "process" | "exec" => Ok(Driver::Process),
            _ => Err(KumiageError::config(format!("Unknown driver: {}", s))),
        }
    }
}

/// Container restart policy, handed to the engine as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    /// One of `no`, `always`, `on-failure`, `unless-stopped`.
    pub condition: String,

    /// Maximum restart attempts (only meaningful for `on-failure`).
    #[serde(default)]
    pub max_attempts: u32,
}

impl RestartPolicy {
    const CONDITIONS: [&'static str; 4] = ["no", "always", "on-failure", "unless-stopped"];

    /// Renders the policy in engine form, e.g. `on-failure:3`.
    ///
    /// `always` never carries a retry count.
    pub fn engine_value(&self) -> String {
        if self.condition == "on-failure" && self.max_attempts > 0 {
            format!("{}:{}", self.condition, self.max_attempts)
        } else {
            self.condition.clone()
        }
    }

    fn validate(&self, service: &str) -> Result<()> {
        if !Self::CONDITIONS.contains(&self.condition.as_str()) {
            return Err(KumiageError::config(format!(
                "services.{}.restart.condition '{}' must be one of {}",
                service,
                self.condition,
                Self::CONDITIONS.join(", ")
            )));
        }
        Ok(())
    }
}

/// Declared configuration of one service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    /// Execution mechanism.
    pub driver: Driver,

    /// Image to run (containers).
    pub image: Option<String>,

    /// Entrypoint override (containers).
    pub entrypoint: Option<String>,

    /// Command line. Required for processes, extra arguments for containers.
    pub command: Option<String>,

    /// Environment variables (KEY=VALUE format).
    pub env: Vec<String>,

    /// Volume specs, `source:target[:ro]`.
    pub volumes: Vec<String>,

    /// Port specs, `host:container[/proto]`.
    pub ports: Vec<String>,

    /// Names of services that must be ready first.
    pub depends_on: Vec<String>,

    /// Command used to stop the service instead of a signal.
    pub on_stop: Option<String>,

    /// Signal used to stop the service, e.g. `SIGINT`.
    pub stop_signal: Option<String>,

    /// Restart policy (containers).
    pub restart: Option<RestartPolicy>,
}

impl ServiceSpec {
    /// Parses the declared volume specs.
    pub fn volume_specs(&self) -> Result<Vec<VolumeSpec>> {
        self.volumes.iter().map(|v| v.parse()).collect()
    }

    /// Parses the declared port specs.
    pub fn port_bindings(&self) -> Result<Vec<PortBinding>> {
        self.ports.iter().map(|p| p.parse()).collect()
    }

    /// Splits the command line into an argument vector.
    pub fn command_argv(&self) -> Result<Vec<String>> {
        match &self.command {
            Some(command) => split_command(command),
            None => Ok(Vec::new()),
        }
    }

    /// Validates the service definition.
    pub fn validate(&self, name: &str) -> Result<()> {
        match self.driver {
            Driver::Container => {
                if self.image.as_deref().map_or(true, str::is_empty) {
                    return Err(KumiageError::config(format!(
                        "services.{}.image is required for container services",
                        name
                    )));
                }
            }
            Driver::Process => {
                if self.command_argv()?.is_empty() {
                    return Err(KumiageError::config(format!(
                        "services.{}.command is required for process services",
                        name
                    )));
                }
            }
        }

        if let Some(on_stop) = &self.on_stop {
            if split_command(on_stop)?.is_empty() {
                return Err(KumiageError::config(format!(
                    "services.{}.on_stop must not be empty",
                    name
                )));
            }
        }

        for env in &self.env {
            if !env.contains('=') {
                return Err(KumiageError::config(format!(
                    "services.{}.env entry '{}' must be KEY=VALUE",
                    name, env
                )));
            }
        }

        if let Some(restart) = &self.restart {
            restart.validate(name)?;
        }

        if self.depends_on.iter().any(|dep| dep == name) {
            return Err(KumiageError::DependencyCycle {
                services: vec![name.to_string()],
            });
        }

        self.volume_specs().map_err(|e| {
            KumiageError::config_with_source(format!("services.{}.volumes", name), e)
        })?;
        self.port_bindings().map_err(|e| {
            KumiageError::config_with_source(format!("services.{}.ports", name), e)
        })?;

        Ok(())
    }
}

/// Splits a command line using shell quoting rules.
pub fn split_command(command: &str) -> Result<Vec<String>> {
    shell_words::split(command).map_err(|e| {
        KumiageError::config_with_source(format!("Failed to parse command '{}'", command), e)
    })
}

/// The declarative service document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Definition {
    /// Services keyed by name.
    pub services: BTreeMap<String, ServiceSpec>,
}

impl Definition {
    /// Parses and validates a definition from YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let definition: Definition = serde_yaml::from_str(content).map_err(|e| {
            KumiageError::config_with_source("Failed to parse service definition", e)
        })?;
        definition.validate()?;
        Ok(definition)
    }

    /// Validates every service.
    pub fn validate(&self) -> Result<()> {
        for (name, spec) in &self.services {
            spec.validate(name)?;
        }
        Ok(())
    }
}
