//! Orchestrator module - dependency-aware startup and teardown.
//!
//! [`Orchestrator`] exposes the command surface (`start`, `ps`, `stop`,
//! `clean`). A `start` validates the definition, prepares the shared network
//! and volumes, then launches every service: services without dependencies
//! inline, dependent ones as tasks that wait on the [`Coordinator`]. The call
//! returns once the [`CompletionBarrier`] has drained.

mod barrier;
mod coordinator;
mod graph;
mod launch;
mod report;
mod teardown;


pub use barrier::{CompletionBarrier, CompletionToken};
pub use coordinator::{Coordinator, Readiness, WaitHandle};
pub use graph::launch_order;
pub use launch::{LaunchAction, LaunchSignal};
pub use report::ps_table;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::{Config, Definition, Driver, OrchestrationConfig};
use crate::driver::Backends;
use crate::error::{KumiageError, Result};
use crate::state::StateStore;
use launch::{launch_service, LaunchContext, LaunchUnit};

/// A command of the orchestrator surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Launch every declared service.
    Start,
    /// Report tracked services.
    Ps,
    /// Stop every tracked service.
    Stop,
    /// Stop and remove everything.
    #[serde(alias = "rm")]
    Clean,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Start => write!(f, "start"),
            Command::Ps => write!(f, "ps"),
            Command::Stop => write!(f, "stop"),
            Command::Clean => write!(f, "clean"),
        }
    }
}

impl FromStr for Command {
    type Err = KumiageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "ps" => Ok(Command::Ps),
            "stop" => Ok(Command::Stop),
            "clean" | "rm" => Ok(Command::Clean),
            _ => Err(KumiageError::invalid_request(format!(
                "Unknown command: {}",
                s
            ))),
        }
    }
}

/// What one launch run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Services handed to a launch task.
    pub services: usize,
    /// Dependency waits registered with the coordinator.
    pub waits: usize,
}

/// Brings services up and down against one state store.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    backends: Backends,
    store: StateStore,
    network: String,
    stop_grace: Duration,
    orchestration: OrchestrationConfig,
}

impl Orchestrator {
    /// Creates an orchestrator.
    pub fn new(backends: Backends, store: StateStore, config: &Config) -> Self {
        Self {
            backends,
            store,
            network: config.engine.network.clone(),
            stop_grace: config.engine.stop_grace(),
            orchestration: config.orchestration.clone(),
        }
    }

    /// Returns the state store.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Persists the state store.
    pub fn save(&self) -> Result<()> {
        self.store.save()
    }

    /// Runs one command. `start` requires a definition.
    pub async fn run_command(
        &self,
        command: Command,
        definition: Option<&Definition>,
    ) -> Result<String> {
        match command {
            Command::Start => {
                let definition = definition.ok_or_else(|| {
                    KumiageError::invalid_request("start requires a service definition")
                })?;
                self.start(definition).await
            }
            Command::Ps => Ok(self.ps()),
            Command::Stop => Ok(self.stop().await),
            Command::Clean => Ok(self.clean().await),
        }
    }

    /// Launches every service of `definition` and returns the status table.
    ///
    /// Configuration and setup errors abort before anything is launched.
    /// Per-service launch failures are logged and do not fail the call.
    #[instrument(skip_all, fields(services = definition.services.len()))]
    pub async fn start(&self, definition: &Definition) -> Result<String> {
        self.launch(definition).await?;
        Ok(self.ps())
    }

    /// Launches every service of `definition` and reports what the run did.
    pub async fn launch(&self, definition: &Definition) -> Result<RunSummary> {
        definition.validate()?;
        let order = graph::launch_order(definition, |dep| self.store.is_running(dep))?;

        if definition
            .services
            .values()
            .any(|spec| spec.driver == Driver::Container)
        {
            self.ensure_network().await?;
            self.register_volumes(definition).await?;
        }

        let mut units = Vec::with_capacity(order.len());
        for name in order {
            let spec = definition
                .services
                .get(&name)
                .ok_or_else(|| KumiageError::ServiceNotFound {
                    service: name.clone(),
                })?;
            units.push(LaunchUnit {
                action: LaunchAction::plan(&name, spec, &self.store)?,
                depends_on: spec.depends_on.clone(),
                name,
            });
        }

        Ok(self.orchestrate(units).await)
    }

    async fn orchestrate(&self, units: Vec<LaunchUnit>) -> RunSummary {
        let services = units.len();
        let barrier = CompletionBarrier::new();
        let ctx = Arc::new(LaunchContext {
            backends: self.backends.clone(),
            store: self.store.clone(),
            coordinator: Coordinator::spawn(),
            readiness: self.orchestration.readiness,
            dependency_timeout: self.orchestration.dependency_timeout(),
        });

        // Dependents are spawned before any inline launch begins.
        let (independent, dependent): (Vec<_>, Vec<_>) =
            units.into_iter().partition(|unit| unit.depends_on.is_empty());

        for unit in dependent {
            tokio::spawn(launch_service(unit, Arc::clone(&ctx), barrier.token()));
        }
        let inline: Vec<(LaunchUnit, CompletionToken)> = independent
            .into_iter()
            .map(|unit| (unit, barrier.token()))
            .collect();
        for (unit, token) in inline {
            launch_service(unit, Arc::clone(&ctx), token).await;
        }

        barrier.wait().await;

        let summary = RunSummary {
            services,
            waits: ctx.coordinator.registrations(),
        };
        info!(services = summary.services, waits = summary.waits, "Launch run finished");
        summary
    }

    async fn ensure_network(&self) -> Result<String> {
        let engine = &self.backends.engine;

        if let Some(id) = self.store.network_id() {
            if engine.inspect_network(&id).await?.is_some() {
                info!(network = %self.network, "Network already created");
                return Ok(id);
            }
        }

        if let Some(id) = engine.inspect_network(&self.network).await? {
            info!(network = %self.network, "Reusing existing network");
            self.store.set_network_id(Some(id.clone()));
            return Ok(id);
        }

        info!(network = %self.network, "Creating network");
        let id = engine.create_network(&self.network).await?;
        self.store.set_network_id(Some(id.clone()));
        Ok(id)
    }

    async fn register_volumes(&self, definition: &Definition) -> Result<()> {
        for spec in definition.services.values() {
            if spec.driver != Driver::Container {
                continue;
            }
            for volume in spec.volume_specs()? {
                if self.store.volume(&volume.source).is_some() {
                    continue;
                }
                info!(source = %volume.source, "Creating local volume");
                let name = self.backends.engine.create_volume().await?;
                self.store.insert_volume(&volume.source, name);
            }
        }
        Ok(())
    }

    /// Returns the status table of every tracked service.
    pub fn ps(&self) -> String {
        ps_table(&self.store)
    }

    /// Stops every tracked service and returns a report.
    #[instrument(skip_all)]
    pub async fn stop(&self) -> String {
        teardown::stop(&self.backends, &self.store, self.stop_grace).await
    }

    /// Removes every container, the network and every volume.
    #[instrument(skip_all)]
    pub async fn clean(&self) -> String {
        teardown::clean(&self.backends, &self.store, self.stop_grace).await
    }
}
