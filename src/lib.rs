//! kumiage - Dependency-aware launcher for containers and local processes
//!
//! This crate brings up a set of declared services on a single host, in
//! dependency order and concurrently where the graph allows it.
//!
//! # Overview
//!
//! A service is either a container managed by the docker engine or a local
//! OS process. Services without dependencies start immediately; dependents
//! wait until every service they depend on has been launched. Launch results
//! are tracked in a state file so that later invocations can report, stop or
//! remove what was started.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`client`] - HTTP client for a remote kumiage server
//! - [`config`] - Configuration file parsing and validation
//! - [`driver`] - Container engine and process runtime collaborators
//! - [`error`] - Error types and error handling
//! - [`orchestrator`] - Dependency-aware startup and teardown
//! - [`server`] - HTTP front end
//! - [`state`] - Persisted runtime state

pub mod cli;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod server;
pub mod state;

// Re-exports for convenience
pub use cli::Cli;
pub use client::KumiageClient;
pub use config::{Config, Definition};
pub use error::{ErrorCode, KumiageError, Result};
pub use orchestrator::{Command, Orchestrator};
pub use server::serve;
pub use state::StateStore;
