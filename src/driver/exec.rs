//! Local process runtime.
//!
//! Spawns service processes with tokio, checks liveness and delivers signals
//! through `nix`, and runs on-stop commands to completion.

use crate::driver::backend::ProcessRuntime;
use crate::error::{KumiageError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Process runtime backed by the host OS.
#[derive(Debug, Clone)]
pub struct OsProcessRuntime {
    command_timeout: Duration,
}

impl OsProcessRuntime {
    /// Creates a runtime. `command_timeout` bounds on-stop commands.
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }
}

fn split_argv(argv: &[String]) -> Result<(&String, &[String])> {
    argv.split_first()
        .ok_or_else(|| KumiageError::process("Empty command"))
}

fn env_pairs<'a>(env: &'a [String]) -> impl Iterator<Item = (&'a str, &'a str)> {
    env.iter().filter_map(|entry| {
        let pair = entry.split_once('=');
        if pair.is_none() {
            warn!(env_var = %entry, "Invalid environment variable format, expected KEY=VALUE");
        }
        pair
    })
}

#[async_trait]
impl ProcessRuntime for OsProcessRuntime {
    async fn spawn(&self, argv: &[String], env: &[String]) -> Result<u32> {
        let (program, args) = split_argv(argv)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(env_pairs(env))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| {
            KumiageError::process_with_source(
                format!("Could not start process {}: {:?}", program, args),
                e,
            )
        })?;

        let pid = child.id().ok_or_else(|| {
            KumiageError::process(format!("Process {} exited immediately", program))
        })?;

        // Reap the child so it does not linger as a zombie while we run.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(pid, exit_code = status.code(), "Process exited"),
                Err(e) => warn!(pid, error = %e, "Failed to wait for process"),
            }
        });

        debug!(pid, program = %program, "Spawned process");
        Ok(pid)
    }

    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        kill(Pid::from_raw(raw), None).is_ok()
    }

    #[cfg(not(unix))]
    fn is_alive(&self, _pid: u32) -> bool {
        false
    }

    #[cfg(unix)]
    fn signal(&self, pid: u32, signal: &str) -> Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let sig = parse_signal(signal)?;
        let raw = i32::try_from(pid)
            .map_err(|_| KumiageError::process(format!("Invalid PID: {}", pid)))?;
        kill(Pid::from_raw(raw), sig).map_err(|e| {
            KumiageError::process_with_source(
                format!("Failed to send {} to PID {}", Signal::as_str(sig), pid),
                e,
            )
        })
    }

    #[cfg(not(unix))]
    fn signal(&self, pid: u32, signal: &str) -> Result<()> {
        Err(KumiageError::process(format!(
            "Sending {} to PID {} is not supported on this platform",
            signal, pid
        )))
    }

    async fn run(&self, argv: &[String]) -> Result<()> {
        let (program, args) = split_argv(argv)?;
        let cmd_str = argv.join(" ");
        debug!(command = %cmd_str, "Executing command");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = timeout(self.command_timeout, cmd.output())
            .await
            .map_err(|_| KumiageError::Timeout {
                operation: format!("command execution: {}", cmd_str),
                seconds: self.command_timeout.as_secs(),
            })?
            .map_err(|e| {
                KumiageError::process_with_source(format!("Failed to execute '{}'", cmd_str), e)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KumiageError::process(format!(
                "'{}' exited with {:?}: {}",
                cmd_str,
                output.status.code(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Parses a signal name such as `SIGTERM` or `term`.
#[cfg(unix)]
pub(crate) fn parse_signal(signal: &str) -> Result<nix::sys::signal::Signal> {
    use std::str::FromStr;

    let upper = signal.trim().to_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    nix::sys::signal::Signal::from_str(&name)
        .map_err(|e| KumiageError::process_with_source(format!("Unknown signal: {}", signal), e))
}
