//! In-memory collaborators for orchestration tests.
//!
//! Both fakes keep a journal of every call as `op:target` strings so tests
//! can assert on ordering, and accept injected failures keyed by the same
//! strings.

use crate::driver::backend::{ContainerConfig, ContainerEngine, ProcessRuntime};
use crate::error::{KumiageError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

#[derive(Debug, Default)]
struct EngineState {
    journal: Vec<String>,
    next_volume: u64,
    networks: BTreeMap<String, String>,
    missing_images: HashSet<String>,
    failures: HashSet<String>,
    create_delays: HashMap<String, Duration>,
}

/// Container engine that records calls instead of running docker.
#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    /// Creates an engine where every image is present and every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an image as absent until it is pulled.
    pub fn with_missing_image(self, image: &str) -> Self {
        self.state.lock().missing_images.insert(image.to_string());
        self
    }

    /// Makes the call journaled as `entry` fail.
    pub fn fail_on(&self, entry: &str) {
        self.state.lock().failures.insert(entry.to_string());
    }

    /// Delays `create_container` for the named container.
    pub fn delay_create(&self, name: &str, delay: Duration) {
        self.state
            .lock()
            .create_delays
            .insert(name.to_string(), delay);
    }

    /// Returns the call journal.
    pub fn journal(&self) -> Vec<String> {
        self.state.lock().journal.clone()
    }

    /// Counts journal entries starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Returns the journal index of `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.state.lock().journal.iter().position(|e| e == entry)
    }

    /// Container id handed out for a container name.
    pub fn container_id(name: &str) -> String {
        format!("{}-id", name)
    }

    fn record(&self, entry: String) -> Result<()> {
        let mut state = self.state.lock();
        let failed = state.failures.contains(&entry);
        state.journal.push(entry.clone());
        if failed {
            return Err(KumiageError::engine(format!("injected failure: {}", entry)));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn inspect_network(&self, network: &str) -> Result<Option<String>> {
        self.record(format!("inspect_network:{}", network))?;
        let state = self.state.lock();
        Ok(state
            .networks
            .iter()
            .find(|(name, id)| *name == network || *id == network)
            .map(|(_, id)| id.clone()))
    }

    async fn create_network(&self, name: &str) -> Result<String> {
        self.record(format!("create_network:{}", name))?;
        let id = format!("{}-id", name);
        self.state
            .lock()
            .networks
            .insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        self.record(format!("remove_network:{}", id))?;
        self.state.lock().networks.retain(|_, v| v != id);
        Ok(())
    }

    async fn create_volume(&self) -> Result<String> {
        let name = {
            let mut state = self.state.lock();
            state.next_volume += 1;
            format!("vol-{}", state.next_volume)
        };
        self.record(format!("create_volume:{}", name))?;
        Ok(name)
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        self.record(format!("remove_volume:{}", name))
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        self.record(format!("pull_image:{}", image))?;
        self.state.lock().missing_images.remove(image);
        Ok(())
    }

    async fn create_container(&self, config: &ContainerConfig) -> Result<String> {
        self.record(format!("create_container:{}", config.name))?;

        let delay = self.state.lock().create_delays.get(&config.name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.state.lock().missing_images.contains(&config.image) {
            return Err(KumiageError::ImageNotFound {
                image: config.image.clone(),
            });
        }
        Ok(Self::container_id(&config.name))
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<()> {
        self.record(format!("connect_network:{}:{}", network, container))
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.record(format!("start_container:{}", id))
    }

    async fn stop_container(&self, id: &str, _grace: Duration) -> Result<()> {
        self.record(format!("stop_container:{}", id))
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<()> {
        self.record(format!("kill_container:{}:{}", id, signal))
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.record(format!("remove_container:{}", id))
    }
}

#[derive(Debug)]
struct ProcessState {
    journal: Vec<String>,
    next_pid: u32,
    alive: HashSet<u32>,
    failures: HashSet<String>,
}

/// Process runtime that hands out fake PIDs.
#[derive(Debug)]
pub struct FakeProcessRuntime {
    state: Mutex<ProcessState>,
}

impl Default for FakeProcessRuntime {
    fn default() -> Self {
        Self {
            state: Mutex::new(ProcessState {
                journal: Vec::new(),
                next_pid: 1000,
                alive: HashSet::new(),
                failures: HashSet::new(),
            }),
        }
    }
}

impl FakeProcessRuntime {
    /// Creates a runtime where every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the call journaled as `entry` fail.
    pub fn fail_on(&self, entry: &str) {
        self.state.lock().failures.insert(entry.to_string());
    }

    /// Simulates a process exiting on its own.
    pub fn kill_externally(&self, pid: u32) {
        self.state.lock().alive.remove(&pid);
    }

    /// Returns the call journal.
    pub fn journal(&self) -> Vec<String> {
        self.state.lock().journal.clone()
    }

    /// Counts journal entries starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    fn record(&self, entry: String) -> Result<()> {
        let mut state = self.state.lock();
        let failed = state.failures.contains(&entry);
        state.journal.push(entry.clone());
        if failed {
            return Err(KumiageError::process(format!("injected failure: {}", entry)));
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessRuntime for FakeProcessRuntime {
    async fn spawn(&self, argv: &[String], _env: &[String]) -> Result<u32> {
        self.record(format!("spawn:{}", argv.join(" ")))?;
        let mut state = self.state.lock();
        let pid = state.next_pid;
        state.next_pid += 1;
        state.alive.insert(pid);
        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.state.lock().alive.contains(&pid)
    }

    fn signal(&self, pid: u32, signal: &str) -> Result<()> {
        self.record(format!("signal:{}:{}", pid, signal))?;
        self.state.lock().alive.remove(&pid);
        Ok(())
    }

    async fn run(&self, argv: &[String]) -> Result<()> {
        self.record(format!("run:{}", argv.join(" ")))
    }
}
