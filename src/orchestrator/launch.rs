//! Launch actions and the per-service launch task.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::barrier::CompletionToken;
use super::coordinator::{Coordinator, Readiness};
use crate::config::{Driver, ReadinessMode, ServiceSpec};
use crate::driver::{Backends, ContainerConfig};
use crate::error::{KumiageError, Result};
use crate::state::{RuntimeRecord, ServiceStatus, StateStore};

/// The deferred operation that brings one service up.
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchAction {
    /// Already running or tracked; nothing to do.
    Noop,
    /// Start an existing, stopped container.
    RestartContainer { id: String },
    /// Create, connect and start a new container.
    CreateContainer {
        config: Box<ContainerConfig>,
        stop_signal: Option<String>,
    },
    /// Spawn a local process.
    SpawnProcess {
        argv: Vec<String>,
        env: Vec<String>,
        stop_signal: Option<String>,
        on_stop: Option<String>,
    },
}

impl LaunchAction {
    /// Decides how to launch `name` given what the store already tracks.
    pub fn plan(name: &str, spec: &ServiceSpec, store: &StateStore) -> Result<Self> {
        match spec.driver {
            Driver::Process => {
                if store.process(name).is_some() {
                    return Ok(LaunchAction::Noop);
                }
                Ok(LaunchAction::SpawnProcess {
                    argv: spec.command_argv()?,
                    env: spec.env.clone(),
                    stop_signal: spec.stop_signal.clone(),
                    on_stop: spec.on_stop.clone(),
                })
            }
            Driver::Container => match store.container(name) {
                Some(record) if record.status == ServiceStatus::Stopped => {
                    Ok(LaunchAction::RestartContainer { id: record.id })
                }
                Some(_) => Ok(LaunchAction::Noop),
                None => Ok(LaunchAction::CreateContainer {
                    config: Box::new(ContainerConfig::for_service(name, spec, &store.volumes())?),
                    stop_signal: spec.stop_signal.clone(),
                }),
            },
        }
    }

    /// Whether this action does nothing.
    pub fn is_noop(&self) -> bool {
        matches!(self, LaunchAction::Noop)
    }
}

/// Tells dependents when a launch counts as ready.
///
/// In `started` mode dependents are released when the action begins, before
/// any collaborator call. In `running` mode they are released on success and
/// told about failure otherwise.
#[derive(Debug)]
pub struct LaunchSignal {
    service: String,
    coordinator: Coordinator,
    mode: ReadinessMode,
    sent: bool,
}

impl LaunchSignal {
    /// Creates a signal for `service`.
    pub fn new(service: &str, coordinator: Coordinator, mode: ReadinessMode) -> Self {
        Self {
            service: service.to_string(),
            coordinator,
            mode,
            sent: false,
        }
    }

    /// Marks the action as begun.
    pub fn begun(&mut self) {
        if self.mode == ReadinessMode::Started {
            self.send(Readiness::Ready);
        }
    }

    /// Marks the action as finished.
    pub fn finish(mut self, succeeded: bool) {
        let readiness = match (self.mode, succeeded) {
            (ReadinessMode::Started, _) | (ReadinessMode::Running, true) => Readiness::Ready,
            (ReadinessMode::Running, false) => Readiness::Failed,
        };
        self.send(readiness);
    }

    /// Reports that the action never ran.
    pub fn abandon(mut self) {
        self.send(Readiness::Failed);
    }

    fn send(&mut self, readiness: Readiness) {
        if self.sent {
            return;
        }
        self.sent = true;
        match readiness {
            Readiness::Ready => self.coordinator.notify_ready(&self.service),
            Readiness::Failed => self.coordinator.notify_failed(&self.service),
        }
    }
}

impl Drop for LaunchSignal {
    fn drop(&mut self) {
        if !self.sent {
            let readiness = match self.mode {
                ReadinessMode::Started => Readiness::Ready,
                ReadinessMode::Running => Readiness::Failed,
            };
            self.send(readiness);
        }
    }
}

/// Shared collaborators of one run.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub backends: Backends,
    pub store: StateStore,
    pub coordinator: Coordinator,
    pub readiness: ReadinessMode,
    pub dependency_timeout: Option<Duration>,
}

/// One service scheduled in a run.
#[derive(Debug, Clone)]
pub struct LaunchUnit {
    pub name: String,
    pub depends_on: Vec<String>,
    pub action: LaunchAction,
}

/// Waits for dependencies, performs the action and releases the token.
///
/// Failures are logged, never returned.
pub async fn launch_service(unit: LaunchUnit, ctx: Arc<LaunchContext>, token: CompletionToken) {
    let _token = token;
    let mut signal = LaunchSignal::new(&unit.name, ctx.coordinator.clone(), ctx.readiness);

    if let Err(e) = await_dependencies(&unit, &ctx).await {
        warn!(service = %unit.name, error = %e, "Skipping launch");
        signal.abandon();
        return;
    }

    if !unit.action.is_noop() {
        info!(service = %unit.name, "Launching service [PENDING]");
    }
    signal.begun();
    let result = execute(&unit.name, &unit.action, &ctx).await;
    match &result {
        Ok(()) if unit.action.is_noop() => {
            debug!(service = %unit.name, "Service already up")
        }
        Ok(()) => info!(service = %unit.name, "Service launched [RUNNING]"),
        Err(e) => error!(service = %unit.name, error = %e, "Failed to launch service"),
    }
    signal.finish(result.is_ok());
}

async fn await_dependencies(unit: &LaunchUnit, ctx: &LaunchContext) -> Result<()> {
    for dependency in &unit.depends_on {
        if ctx.store.is_running(dependency) {
            continue;
        }
        debug!(service = %unit.name, dependency = %dependency, "Waiting for dependency");
        let handle = ctx.coordinator.register_wait_or_launched(dependency);
        match handle.wait_for(ctx.dependency_timeout).await? {
            Readiness::Ready => {}
            Readiness::Failed => {
                return Err(KumiageError::DependencyFailed {
                    service: unit.name.clone(),
                    dependency: dependency.clone(),
                })
            }
        }
    }
    Ok(())
}

/// Performs a launch action and records the result in the store.
pub async fn execute(name: &str, action: &LaunchAction, ctx: &LaunchContext) -> Result<()> {
    let engine = &ctx.backends.engine;

    match action {
        LaunchAction::Noop => Ok(()),
        LaunchAction::RestartContainer { id } => {
            engine.start_container(id).await?;
            ctx.store.set_container_status(name, ServiceStatus::Running);
            Ok(())
        }
        LaunchAction::CreateContainer {
            config,
            stop_signal,
        } => {
            let id = match engine.create_container(config).await {
                Ok(id) => id,
                Err(KumiageError::ImageNotFound { image }) => {
                    info!(service = %name, image = %image, "Pulling image");
                    engine.pull_image(&image).await?;
                    engine.create_container(config).await?
                }
                Err(e) => return Err(e),
            };

            let mut record = RuntimeRecord::container(&id, stop_signal.clone());
            record.status = ServiceStatus::Stopped;
            ctx.store.upsert_container(name, record);
            info!(service = %name, container = %id, "Container created [CREATED]");

            if let Some(network) = ctx.store.network_id() {
                engine.connect_network(&network, &id).await?;
            }
            engine.start_container(&id).await?;
            ctx.store.set_container_status(name, ServiceStatus::Running);
            Ok(())
        }
        LaunchAction::SpawnProcess {
            argv,
            env,
            stop_signal,
            on_stop,
        } => {
            let pid = ctx.backends.processes.spawn(argv, env).await?;
            ctx.store.upsert_process(
                name,
                RuntimeRecord::process(pid, stop_signal.clone(), on_stop.clone()),
            );
            debug!(service = %name, pid, "Process spawned");
            Ok(())
        }
    }
}
