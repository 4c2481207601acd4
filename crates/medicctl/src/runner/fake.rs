//! Fake command runner for deterministic testing
//!
//! Provides scripted responses without spawning processes and records every
//! invocation for assertions.
//!
//! ```rust,ignore
//! let fake = FakeCommandRunner::new()
//!     .respond("npm ls --depth=0", FakeResponse::fail(1, "npm ERR! missing: react"))
//!     .respond("git", FakeResponse::ok(""));
//!
//! let output = fake.run(&invocation).await;
//! assert_eq!(fake.call_count("npm ls --depth=0"), 1);
//! ```

use super::{CommandInvocation, CommandOutput, CommandRunner, CommandStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Pre-configured command response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeResponse {
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
}

impl FakeResponse {
    /// Exit 0 with the given stdout
    pub fn ok(stdout: &str) -> Self {
        Self {
            status: CommandStatus::Exited(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// Non-zero exit with the given stderr
    pub fn fail(code: i32, stderr: &str) -> Self {
        Self {
            status: CommandStatus::Exited(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            status: CommandStatus::TimedOut,
            stdout: String::new(),
            stderr: "Command timeout".to_string(),
        }
    }

    /// The program does not exist on this host
    pub fn missing() -> Self {
        Self {
            status: CommandStatus::SpawnFailed("command not found".to_string()),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Scripted `CommandRunner`.
///
/// Lookup order for a response: exact command line, then program name,
/// then the default response (exit 0, no output).
#[derive(Debug, Clone)]
pub struct FakeCommandRunner {
    responses: HashMap<String, FakeResponse>,
    default_response: FakeResponse,
    calls: Arc<Mutex<Vec<CommandInvocation>>>,
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            default_response: FakeResponse::ok(""),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every command fails with the given response unless scripted otherwise
    pub fn failing_with(response: FakeResponse) -> Self {
        Self::new().default_response(response)
    }

    /// Script a response for a full command line or a bare program name
    pub fn respond(mut self, key: &str, response: FakeResponse) -> Self {
        self.responses.insert(key.to_string(), response);
        self
    }

    pub fn default_response(mut self, response: FakeResponse) -> Self {
        self.default_response = response;
        self
    }

    /// All invocations seen so far, in order
    pub fn calls(&self) -> Vec<CommandInvocation> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Command lines seen so far, in order
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandInvocation::command_line).collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls().len()
    }

    /// Number of calls whose command line equals `line`
    pub fn call_count(&self, line: &str) -> usize {
        self.command_lines().iter().filter(|l| l.as_str() == line).count()
    }

    pub fn was_called(&self, line: &str) -> bool {
        self.call_count(line) > 0
    }

    fn record(&self, invocation: &CommandInvocation) {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(invocation.clone()),
            Err(poisoned) => poisoned.into_inner().push(invocation.clone()),
        }
    }

    fn response_for(&self, invocation: &CommandInvocation) -> FakeResponse {
        self.responses
            .get(&invocation.command_line())
            .or_else(|| self.responses.get(&invocation.program))
            .cloned()
            .unwrap_or_else(|| self.default_response.clone())
    }

    fn respond_to(&self, invocation: &CommandInvocation) -> CommandOutput {
        self.record(invocation);
        let response = self.response_for(invocation);
        let duration_ms = match response.status {
            CommandStatus::TimedOut => invocation.timeout.as_millis() as u64,
            _ => 0,
        };

        CommandOutput {
            status: response.status,
            stdout: response.stdout,
            stderr: response.stderr,
            duration_ms,
        }
    }
}

impl Default for FakeCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(&self, invocation: &CommandInvocation) -> CommandOutput {
        self.respond_to(invocation)
    }

    async fn spawn_detached(&self, invocation: &CommandInvocation) -> CommandOutput {
        self.respond_to(invocation)
    }
}
