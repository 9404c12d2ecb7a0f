//! Application state management.
//!
//! This module manages the shared state across HTTP request handlers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::driver::Backends;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::state::StateStore;

/// Shared application state.
pub struct AppState {
    /// Orchestrator; commands run one at a time.
    pub orchestrator: Mutex<Orchestrator>,
    /// Application start time.
    pub start_time: Instant,
    /// Statistics counters.
    pub stats: Stats,
}

impl AppState {
    /// Creates the state around an existing orchestrator.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Mutex::new(orchestrator),
            start_time: Instant::now(),
            stats: Stats::default(),
        }
    }

    /// Loads the state store and builds the default backends.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = StateStore::load(&config.state.path)?;
        let orchestrator = Orchestrator::new(Backends::from_config(config), store, config);
        Ok(Self::new(orchestrator))
    }

    /// Returns the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Increments the command counter.
    pub fn increment_commands(&self) {
        self.stats.commands_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the failed command counter.
    pub fn increment_failed(&self) {
        self.stats.commands_failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Statistics counters.
#[derive(Debug, Default)]
pub struct Stats {
    /// Commands received.
    pub commands_total: AtomicU64,
    /// Commands that returned an error.
    pub commands_failed: AtomicU64,
}

impl Stats {
    /// Commands received so far.
    pub fn commands_total(&self) -> u64 {
        self.commands_total.load(Ordering::Relaxed)
    }

    /// Commands that failed so far.
    pub fn commands_failed(&self) -> u64 {
        self.commands_failed.load(Ordering::Relaxed)
    }
}
