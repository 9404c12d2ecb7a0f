//! Engine, state file and orchestration settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::KumiageError;

/// Container engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path or name of the docker binary.
    pub docker_bin: String,

    /// Name of the shared network every container is attached to.
    pub network: String,

    /// Timeout for a single engine command in seconds.
    pub command_timeout_secs: u64,

    /// Grace period for a graceful container stop in seconds.
    pub stop_grace_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            docker_bin: "docker".to_string(),
            network: "kumiage-network".to_string(),
            command_timeout_secs: 120,
            stop_grace_secs: 15,
        }
    }
}

impl EngineConfig {
    /// Returns the engine command timeout.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Returns the stop grace period.
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

/// State file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Path of the persisted state file.
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".kumiage.lock"),
        }
    }
}

/// Orchestration behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// When dependents of a service are released.
    pub readiness: ReadinessMode,

    /// Upper bound on how long a service waits for one dependency.
    /// Unset means wait forever.
    pub dependency_timeout_secs: Option<u64>,
}

impl OrchestrationConfig {
    /// Returns the per-dependency wait deadline, if any.
    pub fn dependency_timeout(&self) -> Option<Duration> {
        self.dependency_timeout_secs.map(Duration::from_secs)
    }
}

/// When a launching service counts as ready for its dependents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
    /// Dependents are released as soon as the launch begins, before its first
    /// engine or process call.
    #[default]
    Started,
    /// Dependents are released only after the launch succeeded.
    Running,
}

impl FromStr for ReadinessMode {
    type Err = KumiageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "started" => Ok(ReadinessMode::Started),
            "running" => Ok(ReadinessMode::Running),
            _ => Err(KumiageError::config(format!(
                "Unknown readiness mode: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ReadinessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadinessMode::Started => write!(f, "started"),
            ReadinessMode::Running => write!(f, "running"),
        }
    }
}
