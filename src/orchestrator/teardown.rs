//! Stop and clean.

use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::split_command;
use crate::driver::{Backends, ContainerEngine, ProcessRuntime};
use crate::error::{KumiageError, Result};
use crate::state::{RuntimeRecord, ServiceStatus, StateStore};

const DEFAULT_STOP_SIGNAL: &str = "SIGTERM";
const FALLBACK_KILL_SIGNAL: &str = "SIGKILL";

/// Stops every tracked service and returns a report.
///
/// Containers are marked STOPPED, processes are dropped once stopped.
/// Individual failures are logged and the rest carry on.
pub async fn stop(backends: &Backends, store: &StateStore, grace: Duration) -> String {
    let mut report = String::new();

    for (name, record) in store.containers() {
        if record.status == ServiceStatus::Stopped {
            debug!(service = %name, "Container already stopped");
            continue;
        }
        match stop_container(backends.engine.as_ref(), &record, grace).await {
            Ok(()) => {
                store.set_container_status(&name, ServiceStatus::Stopped);
                info!(service = %name, container = %record.id, "Container stopped [STOPPED]");
                let _ = writeln!(report, "Stopped {} [{}][{}]", name, record.driver, record.id);
            }
            Err(e) => error!(
                service = %name,
                container = %record.id,
                error = %e,
                "Failed to stop container"
            ),
        }
    }

    for name in stop_processes(backends.processes.as_ref(), store).await {
        if let Some(record) = store.remove_process(&name) {
            let _ = writeln!(report, "Stopped {} [{}][{}]", name, record.driver, record.id);
        }
    }

    report
}

/// Stops everything, then removes every container, the network and every
/// volume. Maps are cleared even when engine calls fail.
pub async fn clean(backends: &Backends, store: &StateStore, grace: Duration) -> String {
    let engine = backends.engine.as_ref();
    let mut report = String::new();

    stop_processes(backends.processes.as_ref(), store).await;
    for (name, record) in store.processes() {
        store.remove_process(&name);
        let _ = writeln!(report, "Removed {} [{}][{}]", name, record.driver, record.id);
    }

    for (name, record) in store.containers() {
        if record.status != ServiceStatus::Stopped {
            if let Err(e) = stop_container(engine, &record, grace).await {
                warn!(
                    service = %name,
                    container = %record.id,
                    error = %e,
                    "Failed to stop container"
                );
            }
        }
        if let Err(e) = engine.remove_container(&record.id).await {
            error!(
                service = %name,
                container = %record.id,
                error = %e,
                "Failed to remove container"
            );
        }
        info!(service = %name, container = %record.id, "Container removed [REMOVED]");
        let _ = writeln!(report, "Removed {} [{}][{}]", name, record.driver, record.id);
        store.remove_container(&name);
    }

    if let Some(network) = store.network_id() {
        if let Err(e) = engine.remove_network(&network).await {
            error!(network = %network, error = %e, "Failed to remove network");
        }
        info!(network = %network, "Network removed [REMOVED]");
        let _ = writeln!(report, "Removing Network: {} [REMOVED]", network);
        store.set_network_id(None);
    }

    for (source, volume) in store.volumes() {
        if let Err(e) = engine.remove_volume(&volume).await {
            error!(source = %source, volume = %volume, error = %e, "Failed to remove volume");
        }
        info!(source = %source, volume = %volume, "Volume removed [REMOVED]");
        let _ = writeln!(report, "Removing Volume: {} [REMOVED]", source);
        store.remove_volume(&source);
    }

    report
}

async fn stop_container(
    engine: &dyn ContainerEngine,
    record: &RuntimeRecord,
    grace: Duration,
) -> Result<()> {
    let Some(signal) = &record.stop_signal else {
        return engine.stop_container(&record.id, grace).await;
    };

    if let Err(e) = engine.kill_container(&record.id, signal).await {
        warn!(
            container = %record.id,
            signal = %signal,
            error = %e,
            "Stop signal failed, falling back to {}",
            FALLBACK_KILL_SIGNAL
        );
        engine
            .kill_container(&record.id, FALLBACK_KILL_SIGNAL)
            .await?;
    }
    Ok(())
}

/// Stops every tracked process and returns the names that are now gone.
async fn stop_processes(processes: &dyn ProcessRuntime, store: &StateStore) -> Vec<String> {
    let mut stopped = Vec::new();

    for (name, record) in store.processes() {
        match stop_process(processes, &record).await {
            Ok(()) => {
                info!(service = %name, pid = %record.id, "Process stopped [STOPPED]");
                stopped.push(name);
            }
            Err(e) => {
                error!(service = %name, pid = %record.id, error = %e, "Failed to stop process")
            }
        }
    }

    stopped
}

async fn stop_process(processes: &dyn ProcessRuntime, record: &RuntimeRecord) -> Result<()> {
    let pid = record
        .pid
        .or_else(|| record.id.parse().ok())
        .ok_or_else(|| KumiageError::process(format!("Record has no PID: {}", record.id)))?;

    if !processes.is_alive(pid) {
        debug!(pid, "Process already gone");
        return Ok(());
    }

    match &record.on_stop {
        Some(on_stop) => processes.run(&split_command(on_stop)?).await,
        None => processes.signal(
            pid,
            record.stop_signal.as_deref().unwrap_or(DEFAULT_STOP_SIGNAL),
        ),
    }
}
