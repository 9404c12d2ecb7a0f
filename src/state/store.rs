//! Runtime state store.
//!
//! Holds one [`RuntimeRecord`] per service, the volume map and the shared
//! network identifier. The whole snapshot lives behind a single mutex and is
//! written to disk wholesale.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::Driver;
use crate::error::{KumiageError, Result};

/// Lifecycle status of a tracked service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    /// Status is not known.
    #[default]
    Unknown,
    /// Service is running.
    Running,
    /// Service was stopped and can be restarted.
    Stopped,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Unknown => write!(f, "UNKNOWN"),
            ServiceStatus::Running => write!(f, "RUNNING"),
            ServiceStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Persisted state of one service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimeRecord {
    /// Container id, or the PID rendered as text.
    #[serde(rename = "ID")]
    pub id: String,

    /// Numeric PID (processes only).
    #[serde(rename = "PID", default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Execution mechanism.
    pub driver: Driver,

    /// Current status.
    pub status: ServiceStatus,

    /// Signal used to stop the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<String>,

    /// Command used to stop the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_stop: Option<String>,
}

impl RuntimeRecord {
    /// Creates a running container record.
    pub fn container(id: impl Into<String>, stop_signal: Option<String>) -> Self {
        Self {
            id: id.into(),
            pid: None,
            driver: Driver::Container,
            status: ServiceStatus::Running,
            stop_signal,
            on_stop: None,
        }
    }

    /// Creates a running process record.
    pub fn process(pid: u32, stop_signal: Option<String>, on_stop: Option<String>) -> Self {
        Self {
            id: pid.to_string(),
            pid: Some(pid),
            driver: Driver::Process,
            status: ServiceStatus::Running,
            stop_signal,
            on_stop,
        }
    }

    /// Whether the record counts as ready.
    pub fn is_running(&self) -> bool {
        self.status == ServiceStatus::Running
    }
}

/// On-disk layout of the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Volume source key to engine volume name.
    #[serde(rename = "Volumes", default)]
    pub volumes: BTreeMap<String, String>,

    /// Shared network id, if created.
    #[serde(rename = "NetworkID", default)]
    pub network_id: Option<String>,

    /// Container records by service name.
    #[serde(rename = "Containers", default)]
    pub containers: BTreeMap<String, RuntimeRecord>,

    /// Process records by service name.
    #[serde(rename = "Processes", default)]
    pub processes: BTreeMap<String, RuntimeRecord>,
}

/// Shared handle to the runtime state.
///
/// Cloning is cheap; all clones see the same snapshot. The lock is never held
/// across an await point.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    inner: Arc<Mutex<StateSnapshot>>,
}

impl StateStore {
    /// Creates an empty store persisted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::from_snapshot(path, StateSnapshot::default())
    }

    /// Creates a store from an existing snapshot.
    pub fn from_snapshot(path: impl Into<PathBuf>, snapshot: StateSnapshot) -> Self {
        Self {
            path: path.into(),
            inner: Arc::new(Mutex::new(snapshot)),
        }
    }

    /// Loads the store from `path`. A missing file means a fresh environment.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state file, starting fresh");
                return Ok(Self::new(path));
            }
            Err(e) => {
                return Err(KumiageError::state_with_source(
                    format!("Failed to read state file '{}'", path.display()),
                    e,
                ))
            }
        };

        let snapshot: StateSnapshot = serde_json::from_slice(&content).map_err(|e| {
            KumiageError::state_with_source(
                format!("Failed to parse state file '{}'", path.display()),
                e,
            )
        })?;

        debug!(
            path = %path.display(),
            containers = snapshot.containers.len(),
            processes = snapshot.processes.len(),
            "Loaded state"
        );
        Ok(Self::from_snapshot(path, snapshot))
    }

    /// Writes the store to its path, replacing the previous file.
    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_vec_pretty(&self.snapshot())?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    KumiageError::state_with_source(
                        format!("Failed to create state directory '{}'", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let tmp = self.temp_path();
        std::fs::write(&tmp, content).map_err(|e| {
            KumiageError::state_with_source(
                format!("Failed to write state file '{}'", tmp.display()),
                e,
            )
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            KumiageError::state_with_source(
                format!("Failed to replace state file '{}'", self.path.display()),
                e,
            )
        })?;

        debug!(path = %self.path.display(), "Saved state");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Returns the state file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the current snapshot.
    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.lock().clone()
    }

    /// Whether the service has a RUNNING record of either driver.
    pub fn is_running(&self, name: &str) -> bool {
        let state = self.inner.lock();
        state.containers.get(name).is_some_and(RuntimeRecord::is_running)
            || state.processes.get(name).is_some_and(RuntimeRecord::is_running)
    }

    /// Whether the service has any record.
    pub fn is_tracked(&self, name: &str) -> bool {
        let state = self.inner.lock();
        state.containers.contains_key(name) || state.processes.contains_key(name)
    }

    /// Returns the container record of a service.
    pub fn container(&self, name: &str) -> Option<RuntimeRecord> {
        self.inner.lock().containers.get(name).cloned()
    }

    /// Returns the process record of a service.
    pub fn process(&self, name: &str) -> Option<RuntimeRecord> {
        self.inner.lock().processes.get(name).cloned()
    }

    /// Returns all container records.
    pub fn containers(&self) -> Vec<(String, RuntimeRecord)> {
        let state = self.inner.lock();
        state
            .containers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Returns all process records.
    pub fn processes(&self) -> Vec<(String, RuntimeRecord)> {
        let state = self.inner.lock();
        state
            .processes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Inserts or replaces a container record.
    pub fn upsert_container(&self, name: &str, record: RuntimeRecord) {
        self.inner.lock().containers.insert(name.to_string(), record);
    }

    /// Inserts or replaces a process record.
    pub fn upsert_process(&self, name: &str, record: RuntimeRecord) {
        self.inner.lock().processes.insert(name.to_string(), record);
    }

    /// Updates the status of a container record, if present.
    pub fn set_container_status(&self, name: &str, status: ServiceStatus) {
        if let Some(record) = self.inner.lock().containers.get_mut(name) {
            record.status = status;
        }
    }

    /// Removes a container record.
    pub fn remove_container(&self, name: &str) -> Option<RuntimeRecord> {
        self.inner.lock().containers.remove(name)
    }

    /// Removes a process record.
    pub fn remove_process(&self, name: &str) -> Option<RuntimeRecord> {
        self.inner.lock().processes.remove(name)
    }

    /// Returns the shared network id.
    pub fn network_id(&self) -> Option<String> {
        self.inner.lock().network_id.clone()
    }

    /// Sets or clears the shared network id.
    pub fn set_network_id(&self, id: Option<String>) {
        self.inner.lock().network_id = id;
    }

    /// Returns the engine volume backing a source key.
    pub fn volume(&self, source: &str) -> Option<String> {
        self.inner.lock().volumes.get(source).cloned()
    }

    /// Returns a copy of the volume map.
    pub fn volumes(&self) -> BTreeMap<String, String> {
        self.inner.lock().volumes.clone()
    }

    /// Records the engine volume backing a source key.
    pub fn insert_volume(&self, source: &str, volume: impl Into<String>) {
        self.inner
            .lock()
            .volumes
            .insert(source.to_string(), volume.into());
    }

    /// Forgets a volume.
    pub fn remove_volume(&self, source: &str) -> Option<String> {
        self.inner.lock().volumes.remove(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populated(path: impl Into<PathBuf>) -> StateStore {
        let store = StateStore::new(path);
        store.insert_volume("/data", "vol-1");
        store.set_network_id(Some("net-1".to_string()));
        store.upsert_container("db", RuntimeRecord::container("abc123", None));
        store.upsert_process(
            "worker",
            RuntimeRecord::process(4242, Some("SIGINT".to_string()), Some("worker-ctl stop".to_string())),
        );
        store
    }

    #[test]
    fn test_load_missing_is_fresh() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::load(dir.path().join("missing.lock")).unwrap();
        assert_eq!(store.snapshot(), StateSnapshot::default());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".kumiage.lock");

        let store = populated(&path);
        store.save().unwrap();

        let loaded = StateStore::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
        assert!(!dir.path().join(".kumiage.lock.tmp").exists());
    }

    #[test]
    fn test_file_layout() {
        let store = populated("unused");
        let json = serde_json::to_value(store.snapshot()).unwrap();

        assert_eq!(json["NetworkID"], "net-1");
        assert_eq!(json["Volumes"]["/data"], "vol-1");
        assert_eq!(json["Containers"]["db"]["ID"], "abc123");
        assert_eq!(json["Containers"]["db"]["Status"], "RUNNING");
        assert_eq!(json["Processes"]["worker"]["PID"], 4242);
        assert_eq!(json["Processes"]["worker"]["OnStop"], "worker-ctl stop");
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.lock");
        std::fs::write(&path, "not json").unwrap();

        let err = StateStore::load(&path).unwrap_err();
        assert!(matches!(err, KumiageError::State { .. }));
    }

    #[test]
    fn test_is_running() {
        let store = populated("unused");
        assert!(store.is_running("db"));
        assert!(store.is_running("worker"));
        assert!(!store.is_running("cache"));

        store.set_container_status("db", ServiceStatus::Stopped);
        assert!(!store.is_running("db"));
        assert!(store.is_tracked("db"));
    }

    #[test]
    fn test_clones_share_state() {
        let store = StateStore::new("unused");
        let clone = store.clone();
        clone.upsert_container("web", RuntimeRecord::container("id", None));
        assert!(store.container("web").is_some());
    }
}
