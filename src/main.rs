//! kumiage - Dependency-aware launcher for containers and local processes
//!
//! Entry point for the kumiage application.

use clap::Parser;
use kumiage::cli::{Cli, Commands, ConfigCommands, RemoteArgs, ServeArgs, StartArgs};
use kumiage::config::{Config, Definition, LogFormat, LogLevel, LogOutput, LoggingConfig};
use kumiage::driver::Backends;
use kumiage::error::exit_code;
use kumiage::orchestrator::{Command, Orchestrator};
use kumiage::state::StateStore;
use kumiage::{KumiageClient, KumiageError, Result};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(&cli);

    // Fall back to default logging so a broken config file is still reported.
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    if let Err(e) = init_logging(&logging, cli.log_level()) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(exit_code::GENERAL_ERROR as u8);
    }

    match run(&cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Initialize the tracing subscriber from the logging configuration.
fn init_logging(logging: &LoggingConfig, cli_level: Option<LogLevel>) -> Result<()> {
    let level = LevelFilter::from(logging.effective_level(cli_level));
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let writer = match logging.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File => {
            let path = logging
                .file_path
                .as_deref()
                .ok_or_else(|| KumiageError::config("logging.file_path is required"))?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    KumiageError::config_with_source(
                        format!("Failed to open log file '{}'", path),
                        e,
                    )
                })?;
            BoxMakeWriter::new(std::sync::Mutex::new(file))
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    Ok(())
}

/// Main application logic.
fn run(cli: &Cli, config: Result<Config>) -> Result<()> {
    match &cli.command {
        Commands::Config(ConfigCommands::Validate) => cmd_validate(config),
        Commands::Config(ConfigCommands::Show) => cmd_show(&config?),
        Commands::Start(args) => cmd_start(&config?, args),
        Commands::Ps => cmd_local(&config?, Command::Ps, None),
        Commands::Stop => cmd_local(&config?, Command::Stop, None),
        Commands::Clean => cmd_local(&config?, Command::Clean, None),
        Commands::Serve(args) => cmd_serve(config?, args),
        Commands::Remote(args) => cmd_remote(&config?, args),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        KumiageError::process_with_source("Failed to create async runtime", e)
    })
}

/// Handle the `start` command.
fn cmd_start(config: &Config, args: &StartArgs) -> Result<()> {
    let definition = match &args.file {
        Some(path) => Definition::from_yaml(&read_definition(path)?)?,
        None => config.definition(),
    };

    if definition.services.is_empty() {
        return Err(KumiageError::config("No services are declared"));
    }

    tracing::info!(services = definition.services.len(), "Starting services");
    cmd_local(config, Command::Start, Some(definition))
}

/// Run one command against the local state file, then save it.
fn cmd_local(config: &Config, command: Command, definition: Option<Definition>) -> Result<()> {
    let store = StateStore::load(&config.state.path)?;
    let orchestrator = Orchestrator::new(Backends::from_config(config), store, config);

    let result = runtime()?.block_on(orchestrator.run_command(command, definition.as_ref()));
    let saved = orchestrator.save();

    let output = result?;
    saved?;
    print!("{}", output);
    Ok(())
}

/// Handle the `serve` command.
fn cmd_serve(mut config: Config, args: &ServeArgs) -> Result<()> {
    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!(
        bind = %config.server.bind,
        port = %config.server.port,
        state = %config.state.path.display(),
        "Starting kumiage server"
    );

    runtime()?.block_on(kumiage::serve(&config))
}

/// Handle the `remote` command.
fn cmd_remote(config: &Config, args: &RemoteArgs) -> Result<()> {
    let definition = match (&args.file, args.command) {
        (Some(path), _) => Some(read_definition(path)?),
        (None, Command::Start) => Some(
            serde_yaml::to_string(&config.definition())
                .map_err(|e| KumiageError::config_with_source("Failed to serialize services", e))?,
        ),
        (None, _) => None,
    };

    tracing::info!(target = %args.target, command = %args.command, "Sending command");

    runtime()?.block_on(async {
        let client =
            KumiageClient::with_timeout(&args.target, Duration::from_secs(args.timeout))?;
        let result = client
            .run_command(args.command, definition.as_deref())
            .await?;

        tracing::debug!(
            request_id = %result.request_id,
            duration_ms = result.duration_ms,
            "Command completed"
        );
        print!("{}", result.output);
        Ok(())
    })
}

/// Handle `config validate`.
fn cmd_validate(config: Result<Config>) -> Result<()> {
    match config {
        Ok(config) => {
            println!("✓ Configuration is valid ({} services)", config.services.len());
            Ok(())
        }
        Err(e) => {
            println!("✗ Configuration is invalid: {}", e);
            Err(e)
        }
    }
}

/// Handle `config show`.
fn cmd_show(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config)
        .map_err(|e| KumiageError::config_with_source("Failed to serialize configuration", e))?;
    println!("{}", yaml);
    Ok(())
}

fn read_definition(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        KumiageError::config_with_source(
            format!("Failed to read service definition '{}'", path.display()),
            e,
        )
    })
}

/// Load configuration, applying the `--state` override.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(state) = &cli.state {
        config.state.path = state.clone();
    }
    Ok(config)
}
