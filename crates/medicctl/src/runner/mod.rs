//! Command runner - the single seam through which every process is spawned
//!
//! Takes a program and its argv (never a shell string), a working directory
//! and a timeout. Returns exit status, stdout and stderr without
//! interpretation. Production code uses `TokioCommandRunner`; tests use
//! `FakeCommandRunner`.

mod fake;

pub use fake::{FakeCommandRunner, FakeResponse};

use async_trait::async_trait;
use medic_common::CommandSpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Maximum output length to capture (prevent memory issues)
const MAX_OUTPUT_BYTES: usize = 64 * 1024; // 64KB

/// How long a detached command must survive to count as started
const DETACHED_STARTUP_GRACE: Duration = Duration::from_secs(3);

/// One command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl CommandInvocation {
    pub fn new(spec: &CommandSpec, timeout: Duration) -> Self {
        Self {
            program: spec.program.clone(),
            args: spec.args.clone(),
            cwd: None,
            timeout,
        }
    }

    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Program and arguments joined by single spaces
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// How a command ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// Process exited; -1 when killed by a signal
    Exited(i32),
    /// Killed after exceeding its timeout
    TimedOut,
    /// Could not be started at all (missing tool, permissions)
    SpawnFailed(String),
}

/// Result of a command execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == CommandStatus::Exited(0)
    }

    pub fn timed_out(&self) -> bool {
        self.status == CommandStatus::TimedOut
    }

    pub fn spawn_failed(&self) -> bool {
        matches!(self.status, CommandStatus::SpawnFailed(_))
    }

    /// One-line reason for a failure, suitable for error lists
    pub fn failure_summary(&self) -> String {
        match &self.status {
            CommandStatus::Exited(0) => "succeeded".to_string(),
            CommandStatus::Exited(code) => match first_line(&self.stderr).or_else(|| first_line(&self.stdout)) {
                Some(line) => format!("exit code {}: {}", code, line),
                None => format!("exit code {}", code),
            },
            CommandStatus::TimedOut => format!("timed out after {}ms", self.duration_ms),
            CommandStatus::SpawnFailed(reason) => format!("could not start: {}", reason),
        }
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(200).collect())
}

/// Truncate captured output to `MAX_OUTPUT_BYTES`
fn truncate_output(bytes: &[u8]) -> String {
    if bytes.len() <= MAX_OUTPUT_BYTES {
        String::from_utf8_lossy(bytes).to_string()
    } else {
        let mut text = String::from_utf8_lossy(&bytes[..MAX_OUTPUT_BYTES]).to_string();
        text.push_str("\n[output truncated]");
        text
    }
}

/// External command-execution facility
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, killing the process if it exceeds its timeout
    async fn run(&self, invocation: &CommandInvocation) -> CommandOutput;

    /// Start a long-running process and return without waiting for it.
    ///
    /// Succeeds if the process is still alive after a short startup grace
    /// period, or exited with status 0 within it.
    async fn spawn_detached(&self, invocation: &CommandInvocation) -> CommandOutput;
}

/// Real runner backed by `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &CommandInvocation) -> Command {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).stdin(Stdio::null());
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

fn spawn_error(err: &std::io::Error) -> String {
    match err.kind() {
        std::io::ErrorKind::NotFound => "command not found".to_string(),
        std::io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => format!("OS error: {}", err),
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, invocation: &CommandInvocation) -> CommandOutput {
        let start = Instant::now();
        debug!("Executing: {}", invocation.command_line());

        let child = Self::command(invocation)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start {}: {}", invocation.program, e);
                return CommandOutput {
                    status: CommandStatus::SpawnFailed(spawn_error(&e)),
                    stdout: String::new(),
                    stderr: e.to_string(),
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        };

        // On timeout the future is dropped, which drops the child and kills it
        match timeout(invocation.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => CommandOutput {
                status: CommandStatus::Exited(output.status.code().unwrap_or(-1)),
                stdout: truncate_output(&output.stdout),
                stderr: truncate_output(&output.stderr),
                duration_ms: start.elapsed().as_millis() as u64,
            },
            Ok(Err(e)) => CommandOutput {
                status: CommandStatus::Exited(-1),
                stdout: String::new(),
                stderr: format!("Failed to collect output: {}", e),
                duration_ms: start.elapsed().as_millis() as u64,
            },
            Err(_) => {
                warn!(
                    "Command timed out after {}ms: {}",
                    invocation.timeout.as_millis(),
                    invocation.command_line()
                );
                CommandOutput {
                    status: CommandStatus::TimedOut,
                    stdout: String::new(),
                    stderr: "Command timeout".to_string(),
                    duration_ms: invocation.timeout.as_millis() as u64,
                }
            }
        }
    }

    async fn spawn_detached(&self, invocation: &CommandInvocation) -> CommandOutput {
        let start = Instant::now();
        debug!("Starting detached: {}", invocation.command_line());

        let child = Self::command(invocation)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start {}: {}", invocation.program, e);
                return CommandOutput {
                    status: CommandStatus::SpawnFailed(spawn_error(&e)),
                    stdout: String::new(),
                    stderr: e.to_string(),
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        };

        let grace = DETACHED_STARTUP_GRACE.min(invocation.timeout);
        let status = match timeout(grace, child.wait()).await {
            Ok(Ok(exit)) => CommandStatus::Exited(exit.code().unwrap_or(-1)),
            Ok(Err(e)) => CommandStatus::SpawnFailed(format!("OS error: {}", e)),
            // Still running: that is what we wanted
            Err(_) => CommandStatus::Exited(0),
        };

        CommandOutput {
            status,
            stdout: child.id().map(|pid| format!("pid {}", pid)).unwrap_or_default(),
            stderr: String::new(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(argv: &[&str], timeout_ms: u64) -> CommandInvocation {
        let spec = CommandSpec::from_argv(argv).unwrap();
        CommandInvocation::new(&spec, Duration::from_millis(timeout_ms))
    }

    #[test]
    fn test_command_line() {
        assert_eq!(invocation(&["npm", "ls", "--depth=0"], 10).command_line(), "npm ls --depth=0");
        assert_eq!(invocation(&["true"], 10).command_line(), "true");
    }

    #[test]
    fn test_failure_summary_prefers_stderr() {
        let output = CommandOutput {
            status: CommandStatus::Exited(2),
            stdout: "partial\n".to_string(),
            stderr: "\n  npm ERR! missing: react@18\nmore".to_string(),
            duration_ms: 12,
        };
        assert_eq!(output.failure_summary(), "exit code 2: npm ERR! missing: react@18");
    }

    #[test]
    fn test_truncate_output() {
        let big = vec![b'a'; MAX_OUTPUT_BYTES + 10];
        assert!(truncate_output(&big).ends_with("[output truncated]"));
        assert_eq!(truncate_output(b"ok"), "ok");
    }

    #[tokio::test]
    async fn test_run_echo() {
        let output = TokioCommandRunner.run(&invocation(&["echo", "hello"], 5_000)).await;
        assert!(output.success());
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let output = TokioCommandRunner
            .run(&invocation(&["medic-definitely-not-installed"], 1_000))
            .await;
        assert_eq!(
            output.status,
            CommandStatus::SpawnFailed("command not found".to_string())
        );
    }

    #[tokio::test]
    async fn test_timeout_kills() {
        let output = TokioCommandRunner.run(&invocation(&["sleep", "5"], 100)).await;
        assert!(output.timed_out());
    }

    #[tokio::test]
    async fn test_detached_still_running_counts_as_started() {
        let output = TokioCommandRunner
            .spawn_detached(&invocation(&["sleep", "2"], 200))
            .await;
        assert!(output.success());
        assert!(output.stdout.starts_with("pid "));
        assert!(output.duration_ms < 2_000);
    }

    #[tokio::test]
    async fn test_detached_quick_exit_reports_code() {
        let output = TokioCommandRunner
            .spawn_detached(&invocation(&["sh", "-c", "exit 3"], 2_000))
            .await;
        assert_eq!(output.status, CommandStatus::Exited(3));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_detached_missing_program() {
        let output = TokioCommandRunner
            .spawn_detached(&invocation(&["medic-definitely-not-installed"], 1_000))
            .await;
        assert!(output.spawn_failed());
    }
}
