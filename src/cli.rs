//! Command-line interface definition for kumiage.
//!
//! This module defines the CLI structure using clap derive macros,
//! including all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::LogLevel;
use crate::orchestrator::Command;

/// kumiage - Dependency-aware launcher for containers and local processes
///
/// Brings up the services declared in the configuration file in dependency
/// order, reports them, and tears them down again.
#[derive(Debug, Parser)]
#[command(name = "kumiage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "KUMIAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the state file (overrides `state.path`)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Increase verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the level requested by `-v`/`-q`, if any.
    pub fn log_level(&self) -> Option<LogLevel> {
        LogLevel::from_verbosity(self.verbose, self.quiet)
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Launch every declared service in dependency order
    Start(StartArgs),

    /// List tracked services
    Ps,

    /// Stop every tracked service
    Stop,

    /// Stop and remove every container, the network and all volumes
    #[command(alias = "rm")]
    Clean,

    /// Serve the commands over HTTP
    Serve(ServeArgs),

    /// Run a command on a remote kumiage server
    Remote(RemoteArgs),

    /// Configuration file operations
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Arguments for the `start` subcommand.
#[derive(Debug, Args)]
pub struct StartArgs {
    /// Service definition file (defaults to the `services` of the configuration)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

/// Arguments for the `serve` subcommand.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Bind address (overrides `server.bind`)
    #[arg(long)]
    pub bind: Option<String>,

    /// Listen port (overrides `server.port`)
    #[arg(long)]
    pub port: Option<u16>,
}

/// Arguments for the `remote` subcommand.
#[derive(Debug, Args)]
pub struct RemoteArgs {
    /// Target server URL (e.g., http://host:8080)
    #[arg(short, long)]
    pub target: String,

    /// Command to run: start, ps, stop, clean
    #[arg(value_parser = parse_command)]
    pub command: Command,

    /// Service definition file sent with `start`
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value = "300")]
    pub timeout: u64,
}

/// Configuration subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Validate the configuration file
    Validate,

    /// Show the current configuration
    Show,
}

/// Parse an orchestrator command from string.
fn parse_command(s: &str) -> Result<Command, String> {
    s.parse::<Command>().map_err(|e| e.to_string())
}
