//! Driver module - container engine and process runtime collaborators.
//!
//! This module provides the traits the orchestrator drives services through,
//! together with the docker CLI engine and the OS process runtime.

pub mod backend;
pub mod docker;
pub mod exec;

#[cfg(test)]
pub(crate) mod fake;


use crate::config::Config;
use docker::DockerEngine;
use exec::OsProcessRuntime;
use std::sync::Arc;

// Re-exports for convenience
pub use backend::{ContainerConfig, ContainerEngine, ProcessRuntime, VolumeMount};

/// The collaborators one orchestrator runs against.
#[derive(Clone)]
pub struct Backends {
    /// Container engine.
    pub engine: Arc<dyn ContainerEngine>,
    /// Local process runtime.
    pub processes: Arc<dyn ProcessRuntime>,
}

impl Backends {
    /// Creates the docker engine and OS process runtime from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            engine: Arc::new(DockerEngine::new(&config.engine)),
            processes: Arc::new(OsProcessRuntime::new(config.engine.command_timeout())),
        }
    }

    /// Creates a bundle from explicit collaborators.
    pub fn new(engine: Arc<dyn ContainerEngine>, processes: Arc<dyn ProcessRuntime>) -> Self {
        Self { engine, processes }
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("engine", &self.engine.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backends_from_config() {
        let backends = Backends::from_config(&Config::default());
        assert_eq!(backends.engine.name(), "docker");
        assert!(format!("{:?}", backends).contains("docker"));
    }
}
