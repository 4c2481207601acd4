//! Trigger detector - runs the probe battery and turns failures into triggers
//!
//! Probes run one after another, each inside its own task with its own
//! timeout. Detection never fails: a probe that cannot run, or whose task
//! panics, becomes a `system-failure` trigger instead.

use crate::runner::{CommandInvocation, CommandOutput, CommandRunner, CommandStatus};
use medic_common::{
    rank_triggers, CommandSpec, EventSink, MedicConfig, RecoveryEvent, Severity, SourceSubsystem,
    Trigger, TriggerKind,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

static TS_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"error TS\d+").expect("valid regex"));

static LINT_PROBLEMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+) problems?").expect("valid regex"));

/// What a probe checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeCheck {
    /// Run a command; exit 0 is healthy
    Command(CommandSpec),
    /// Open a TCP connection; connecting is healthy
    Port { host: String, port: u16 },
}

/// One health probe and the trigger it raises on failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub name: String,
    pub source: SourceSubsystem,
    pub check: ProbeCheck,
    pub timeout: Duration,
    pub failure_kind: TriggerKind,
    pub severity: Severity,
}

impl ProbeSpec {
    pub fn command(
        name: &str,
        source: SourceSubsystem,
        command: CommandSpec,
        timeout: Duration,
        failure_kind: TriggerKind,
        severity: Severity,
    ) -> Self {
        Self {
            name: name.to_string(),
            source,
            check: ProbeCheck::Command(command),
            timeout,
            failure_kind,
            severity,
        }
    }

    /// The fixed battery: dependencies, supervisor, type check, lint, dev server
    pub fn standard_battery(config: &MedicConfig) -> Vec<ProbeSpec> {
        let probe_timeout = config.probe_timeout();
        let mut probes = vec![ProbeSpec::command(
            "dependencies",
            SourceSubsystem::Dependencies,
            CommandSpec::new("npm", ["ls", "--depth=0"]),
            probe_timeout,
            TriggerKind::BuildFailure,
            Severity::High,
        )];

        // Validated non-empty on load; a hand-built config may still skip it
        if let Some((program, args)) = config.probes.supervisor_command.split_first() {
            probes.push(ProbeSpec::command(
                "supervisor",
                SourceSubsystem::Supervisor,
                CommandSpec::new(program.as_str(), args.iter().cloned()),
                probe_timeout,
                TriggerKind::ProcessFailure,
                Severity::High,
            ));
        }

        probes.push(ProbeSpec::command(
            "type-check",
            SourceSubsystem::TypeCheck,
            CommandSpec::new("npx", ["tsc", "--noEmit"]),
            config.type_check_timeout(),
            TriggerKind::BuildFailure,
            Severity::Medium,
        ));

        if !config.probes.skip_lint {
            probes.push(ProbeSpec::command(
                "lint",
                SourceSubsystem::Lint,
                CommandSpec::new("npm", ["run", "--silent", "lint"]),
                probe_timeout,
                TriggerKind::BuildFailure,
                Severity::Low,
            ));
        }

        if !config.probes.skip_dev_server {
            probes.push(ProbeSpec {
                name: "dev-server".to_string(),
                source: SourceSubsystem::DevServer,
                check: ProbeCheck::Port {
                    host: config.project.dev_server_host.clone(),
                    port: config.project.dev_server_port,
                },
                timeout: probe_timeout,
                failure_kind: TriggerKind::ServerCrash,
                severity: Severity::High,
            });
        }

        probes
    }
}

/// Result of one probe
#[derive(Debug)]
enum ProbeOutcome {
    Passed { duration_ms: u64 },
    Failed(Trigger),
}

pub struct TriggerDetector {
    runner: Arc<dyn CommandRunner>,
    probes: Vec<ProbeSpec>,
    project_root: PathBuf,
    sink: Arc<dyn EventSink>,
}

impl TriggerDetector {
    /// Detector over the standard battery for this config
    pub fn new(runner: Arc<dyn CommandRunner>, config: &MedicConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            runner,
            probes: ProbeSpec::standard_battery(config),
            project_root: config.project.root.clone(),
            sink,
        }
    }

    /// Replace the probe battery
    pub fn with_probes(mut self, probes: Vec<ProbeSpec>) -> Self {
        self.probes = probes;
        self
    }

    pub fn probes(&self) -> &[ProbeSpec] {
        &self.probes
    }

    /// Run every probe and return the triggers, most severe first
    pub async fn detect_triggers(&self) -> Vec<Trigger> {
        self.sink.emit(RecoveryEvent::DetectionStarted {
            probes: self.probes.len(),
        });
        info!("Running {} health probes", self.probes.len());

        let mut triggers = Vec::new();
        for probe in &self.probes {
            let runner = Arc::clone(&self.runner);
            let task_probe = probe.clone();
            let root = self.project_root.clone();

            let handle = tokio::spawn(async move { run_probe(runner.as_ref(), &task_probe, root).await });

            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Probe {} task failed: {}", probe.name, e);
                    ProbeOutcome::Failed(
                        Trigger::new(
                            TriggerKind::SystemFailure,
                            Severity::Critical,
                            SourceSubsystem::Detector,
                            format!("probe {} crashed: {}", probe.name, e),
                        )
                        .with_affected(probe.source.as_str()),
                    )
                }
            };

            match outcome {
                ProbeOutcome::Passed { duration_ms } => {
                    debug!("Probe {} passed in {}ms", probe.name, duration_ms);
                    self.sink.emit(RecoveryEvent::ProbePassed {
                        probe: probe.name.clone(),
                        duration_ms,
                    });
                }
                ProbeOutcome::Failed(trigger) => {
                    self.sink.emit(RecoveryEvent::ProbeFailed {
                        probe: probe.name.clone(),
                        source: trigger.source,
                        kind: trigger.kind.clone(),
                        severity: trigger.severity,
                        message: trigger.message.clone(),
                    });
                    triggers.push(trigger);
                }
            }
        }

        self.sink.emit(RecoveryEvent::DetectionFinished {
            triggers: triggers.len(),
        });
        rank_triggers(triggers)
    }
}

async fn run_probe(runner: &dyn CommandRunner, probe: &ProbeSpec, root: PathBuf) -> ProbeOutcome {
    match &probe.check {
        ProbeCheck::Command(command) => {
            let invocation = CommandInvocation::new(command, probe.timeout).in_dir(root);
            let output = runner.run(&invocation).await;
            command_outcome(probe, &output)
        }
        ProbeCheck::Port { host, port } => port_outcome(probe, host, *port).await,
    }
}

fn command_outcome(probe: &ProbeSpec, output: &CommandOutput) -> ProbeOutcome {
    match &output.status {
        CommandStatus::Exited(0) => ProbeOutcome::Passed {
            duration_ms: output.duration_ms,
        },
        CommandStatus::Exited(_) => ProbeOutcome::Failed(Trigger::new(
            probe.failure_kind.clone(),
            probe.severity,
            probe.source,
            format!("{} failed: {}", probe.name, summarize(probe.source, output)),
        )),
        CommandStatus::TimedOut => ProbeOutcome::Failed(Trigger::new(
            TriggerKind::HookTimeout,
            probe.severity,
            probe.source,
            format!("{} timed out after {}ms", probe.name, probe.timeout.as_millis()),
        )),
        CommandStatus::SpawnFailed(reason) => ProbeOutcome::Failed(Trigger::new(
            TriggerKind::SystemFailure,
            Severity::Critical,
            probe.source,
            format!("{} could not run: {}", probe.name, reason),
        )),
    }
}

async fn port_outcome(probe: &ProbeSpec, host: &str, port: u16) -> ProbeOutcome {
    let start = Instant::now();
    let address = format!("{}:{}", host, port);

    match tokio::time::timeout(probe.timeout, TcpStream::connect(&address)).await {
        Ok(Ok(_stream)) => ProbeOutcome::Passed {
            duration_ms: start.elapsed().as_millis() as u64,
        },
        Ok(Err(e)) => ProbeOutcome::Failed(Trigger::new(
            probe.failure_kind.clone(),
            probe.severity,
            probe.source,
            format!("{} not answering on {}: {}", probe.name, address, e),
        )),
        Err(_) => ProbeOutcome::Failed(Trigger::new(
            TriggerKind::HookTimeout,
            probe.severity,
            probe.source,
            format!("{} connect to {} timed out", probe.name, address),
        )),
    }
}

/// Short diagnostic for a failed probe command
fn summarize(source: SourceSubsystem, output: &CommandOutput) -> String {
    let combined = format!("{}\n{}", output.stdout, output.stderr);
    match source {
        SourceSubsystem::TypeCheck => {
            let count = TS_ERROR.find_iter(&combined).count();
            if count > 0 {
                return format!("{} TypeScript error{}", count, if count == 1 { "" } else { "s" });
            }
        }
        SourceSubsystem::Lint => {
            if let Some(caps) = LINT_PROBLEMS.captures(&combined) {
                return format!("{} lint problems", &caps[1]);
            }
        }
        _ => {}
    }
    output.failure_summary()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: i32, stdout: &str) -> CommandOutput {
        CommandOutput {
            status: CommandStatus::Exited(code),
            stdout: stdout.to_string(),
            stderr: String::new(),
            duration_ms: 5,
        }
    }

    #[test]
    fn test_summarize_counts_ts_errors() {
        let out = output(
            2,
            "src/a.ts(1,1): error TS2304: Cannot find name 'x'.\nsrc/b.ts(4,2): error TS2322: bad",
        );
        assert_eq!(summarize(SourceSubsystem::TypeCheck, &out), "2 TypeScript errors");
    }

    #[test]
    fn test_summarize_lint_problems() {
        let out = output(1, "\u{2716} 7 problems (5 errors, 2 warnings)");
        assert_eq!(summarize(SourceSubsystem::Lint, &out), "7 lint problems");
    }

    #[test]
    fn test_summarize_falls_back_to_first_line() {
        let out = output(1, "npm ERR! missing: react@18\n");
        assert_eq!(
            summarize(SourceSubsystem::Dependencies, &out),
            "exit code 1: npm ERR! missing: react@18"
        );
    }

    #[test]
    fn test_standard_battery_respects_skips() {
        let mut config = MedicConfig::default();
        assert_eq!(ProbeSpec::standard_battery(&config).len(), 5);

        config.probes.skip_lint = true;
        config.probes.skip_dev_server = true;
        let names: Vec<String> = ProbeSpec::standard_battery(&config)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["dependencies", "supervisor", "type-check"]);
    }

    #[test]
    fn test_timeout_maps_to_hook_timeout_with_probe_severity() {
        let probe = &ProbeSpec::standard_battery(&MedicConfig::default())[2];
        let timed_out = CommandOutput {
            status: CommandStatus::TimedOut,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 90_000,
        };
        match command_outcome(probe, &timed_out) {
            ProbeOutcome::Failed(trigger) => {
                assert_eq!(trigger.kind, TriggerKind::HookTimeout);
                assert_eq!(trigger.severity, Severity::Medium);
                assert_eq!(trigger.source, SourceSubsystem::TypeCheck);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
