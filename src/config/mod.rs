//! Configuration module for kumiage.
//!
//! This module provides all configuration types and loading functionality.
//! Configuration is loaded from a YAML file and adjusted by environment
//! variables.

mod logging;
mod mounts;
mod orchestration;
mod server;
mod service;

pub use logging::{LogFormat, LogLevel, LogOutput, LoggingConfig};
pub use mounts::{PortBinding, Protocol, VolumeSpec};
pub use orchestration::{EngineConfig, OrchestrationConfig, ReadinessMode, StateConfig};
pub use server::ServerConfig;
pub use service::{split_command, Definition, Driver, RestartPolicy, ServiceSpec};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{KumiageError, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "KUMIAGE_CONFIG";

/// Configuration file used when neither `--config` nor `KUMIAGE_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Server configuration.
    pub server: ServerConfig,

    /// Container engine configuration.
    pub engine: EngineConfig,

    /// State file configuration.
    pub state: StateConfig,

    /// Orchestration behaviour.
    pub orchestration: OrchestrationConfig,

    /// Service definitions.
    pub services: BTreeMap<String, ServiceSpec>,
}

impl Config {
    /// Loads configuration from an optional path.
    ///
    /// Without a path, `KUMIAGE_CONFIG` is consulted, then `./config.yaml`.
    /// A missing default file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from_path(p)?,
            None => match std::env::var(CONFIG_ENV) {
                Ok(p) if !p.is_empty() => Self::load_from_path(p)?,
                _ => {
                    if Path::new(DEFAULT_CONFIG_PATH).exists() {
                        Self::load_from_path(DEFAULT_CONFIG_PATH)?
                    } else {
                        Self::default()
                    }
                }
            },
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            KumiageError::config_with_source(
                format!("Failed to read config file '{}'", path.as_ref().display()),
                e,
            )
        })?;

        Self::load_from_str(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn load_from_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| KumiageError::config_with_source("Failed to parse config", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Applies `KUMIAGE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("KUMIAGE_LOG_LEVEL") {
            self.logging.level = level.parse()?;
        }
        if let Some(format) = lookup("KUMIAGE_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        if let Some(bind) = lookup("KUMIAGE_SERVER_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("KUMIAGE_SERVER_PORT") {
            self.server.port = port.parse().map_err(|e| {
                KumiageError::config_with_source(
                    format!("Invalid KUMIAGE_SERVER_PORT: {}", port),
                    e,
                )
            })?;
        }
        if let Some(path) = lookup("KUMIAGE_STATE_PATH") {
            self.state.path = PathBuf::from(path);
        }
        if let Some(bin) = lookup("KUMIAGE_DOCKER_BIN") {
            self.engine.docker_bin = bin;
        }
        Ok(())
    }

    /// Validates configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(KumiageError::config("server.port must be > 0"));
        }

        if self.logging.output == LogOutput::File && self.logging.file_path.is_none() {
            return Err(KumiageError::config(
                "logging.file_path is required when output is file",
            ));
        }

        if self.engine.docker_bin.is_empty() {
            return Err(KumiageError::config("engine.docker_bin must not be empty"));
        }

        if self.engine.network.is_empty() {
            return Err(KumiageError::config("engine.network must not be empty"));
        }

        if self.engine.command_timeout_secs == 0 {
            return Err(KumiageError::config(
                "engine.command_timeout_secs must be > 0",
            ));
        }

        if self.orchestration.dependency_timeout_secs == Some(0) {
            return Err(KumiageError::config(
                "orchestration.dependency_timeout_secs must be > 0",
            ));
        }

        if self.state.path.as_os_str().is_empty() {
            return Err(KumiageError::config("state.path must not be empty"));
        }

        self.definition().validate()
    }

    /// Returns the service definition carried by this configuration.
    pub fn definition(&self) -> Definition {
        Definition {
            services: self.services.clone(),
        }
    }
}
