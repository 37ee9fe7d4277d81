//! External CLI runner
//!
//! Runs the Claude Code executable with a bounded timeout and captures its
//! output. Running never fails: spawn errors and timeouts come back as a
//! [`CliResult`] with `ok == false`.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{info, warn};

use crate::bridge::command::display_command;

/// Exit code reported for spawn failures and timeouts
pub const SENTINEL_EXIT_CODE: i32 = -1;

/// Outcome of one external CLI invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CliResult {
    /// `exit_code == 0`
    pub ok: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Command as run, for display
    pub command: String,
    pub timed_out: bool,
}

impl CliResult {
    /// Result for a process that exited with `exit_code`
    pub fn exited(command: String, exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            ok: exit_code == 0,
            exit_code,
            stdout,
            stderr,
            command,
            timed_out: false,
        }
    }

    /// Result for a process that could not be started
    pub fn spawn_failed(command: String, message: String) -> Self {
        Self::exited(command, SENTINEL_EXIT_CODE, String::new(), message)
    }

    /// Result for a process killed after its deadline
    pub fn timed_out(command: String, timeout: Duration) -> Self {
        Self {
            timed_out: true,
            ..Self::exited(
                command,
                SENTINEL_EXIT_CODE,
                String::new(),
                format!("timed out after {}s", timeout.as_secs_f64()),
            )
        }
    }

    /// stdout and stderr joined, for phrase detection
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Per-call options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Working directory; project-scoped operations act on this project
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Something that can run the external CLI
#[async_trait]
pub trait CliRunner: Send + Sync {
    /// Program name shown in messages
    fn binary(&self) -> &str;

    /// Run with discrete argument tokens
    async fn run(&self, args: &[String], options: &RunOptions) -> CliResult;

    /// Cheap availability check; `Err` carries the reason
    async fn probe(&self) -> std::result::Result<(), String>;
}

#[async_trait]
impl<T: CliRunner + ?Sized> CliRunner for Box<T> {
    fn binary(&self) -> &str {
        (**self).binary()
    }

    async fn run(&self, args: &[String], options: &RunOptions) -> CliResult {
        (**self).run(args, options).await
    }

    async fn probe(&self) -> std::result::Result<(), String> {
        (**self).probe().await
    }
}

/// Runner for the real `claude` executable
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    binary: String,
    probe_timeout: Duration,
}

impl ClaudeCli {
    pub fn new(binary: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            probe_timeout,
        }
    }
}

#[async_trait]
impl CliRunner for ClaudeCli {
    fn binary(&self) -> &str {
        &self.binary
    }

    async fn run(&self, args: &[String], options: &RunOptions) -> CliResult {
        let command = display_command(&self.binary, args);
        let start = Instant::now();

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }

        let result = tokio::time::timeout(options.timeout, cmd.output()).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(SENTINEL_EXIT_CODE);
                info!(%command, exit_code, elapsed_ms, "external CLI finished");
                CliResult::exited(
                    command,
                    exit_code,
                    String::from_utf8_lossy(&output.stdout).to_string(),
                    String::from_utf8_lossy(&output.stderr).to_string(),
                )
            }
            Ok(Err(e)) => {
                warn!(%command, error = %e, "failed to spawn external CLI");
                CliResult::spawn_failed(
                    command,
                    format!("failed to run {}: {}", self.binary, e),
                )
            }
            Err(_) => {
                warn!(%command, elapsed_ms, "external CLI timed out; process killed");
                CliResult::timed_out(command, options.timeout)
            }
        }
    }

    async fn probe(&self) -> std::result::Result<(), String> {
        let options = RunOptions {
            cwd: None,
            timeout: self.probe_timeout,
        };
        let result = self.run(&["--version".to_string()], &options).await;
        if result.ok {
            Ok(())
        } else if result.stderr.trim().is_empty() {
            Err(format!("`{}` exited with code {}", result.command, result.exit_code))
        } else {
            Err(result.stderr.trim().to_string())
        }
    }
}
