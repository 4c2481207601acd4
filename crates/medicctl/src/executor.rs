//! Plan executor - runs a remediation plan's actions in order
//!
//! State machine: pending -> running -> completed | partial | aborted.
//! Actions never run concurrently and nothing is retried.

use crate::runner::{CommandInvocation, CommandOutput, CommandRunner, CommandStatus};
use medic_common::{
    Action, ActionOutcome, ActionState, CommandSpec, EventSink, ExecutionPhase, ExecutionResult,
    MedicConfig, RecoveryEvent, RecoveryStatus, RemediationPlan, StateSnapshot,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct PlanExecutor {
    runner: Arc<dyn CommandRunner>,
    project_root: PathBuf,
    validation_timeout: Duration,
    recovery_check_timeout: Duration,
    sink: Arc<dyn EventSink>,
}

impl PlanExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &MedicConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            runner,
            project_root: config.project.root.clone(),
            validation_timeout: config.validation_timeout(),
            recovery_check_timeout: config.recovery_check_timeout(),
            sink,
        }
    }

    /// Execute every action of `plan`, then its recovery check
    pub async fn execute(&self, plan: &RemediationPlan, snapshot: &StateSnapshot) -> ExecutionResult {
        let start = Instant::now();
        let mut phase = ExecutionPhase::Pending;
        info!(
            "Executing plan {} ({} strategy, {} actions) against snapshot {}",
            plan.name,
            plan.strategy,
            plan.actions.len(),
            snapshot.id
        );

        let mut ordered: Vec<&Action> = plan.actions.iter().collect();
        ordered.sort_by_key(|a| a.sequence);

        let mut errors = Vec::new();
        let mut outcomes = Vec::with_capacity(ordered.len());
        let mut actions_completed = 0usize;
        let mut any_failed = false;

        phase = transition(phase, ExecutionPhase::Running);

        for action in ordered {
            if phase == ExecutionPhase::Aborted {
                self.sink.emit(RecoveryEvent::ActionSkipped {
                    sequence: action.sequence,
                    description: action.description.clone(),
                });
                outcomes.push(ActionOutcome {
                    sequence: action.sequence,
                    description: action.description.clone(),
                    state: ActionState::Skipped,
                    validation_passed: None,
                    duration_ms: 0,
                });
                continue;
            }

            let outcome = self.run_action(action, &mut errors).await;
            if outcome.state == ActionState::Succeeded {
                actions_completed += 1;
            } else {
                any_failed = true;
                if plan.strategy.aborts_on_failure() {
                    warn!(
                        "Action {} failed under {} strategy, aborting remaining actions",
                        action.sequence, plan.strategy
                    );
                    phase = transition(phase, ExecutionPhase::Aborted);
                }
            }
            outcomes.push(outcome);
        }

        if phase == ExecutionPhase::Running {
            phase = transition(
                phase,
                if any_failed {
                    ExecutionPhase::Partial
                } else {
                    ExecutionPhase::Completed
                },
            );
        }

        let check_failures = self.run_recovery_check(plan).await;
        let recovery_check_passed = check_failures.is_empty();
        errors.extend(check_failures);

        let succeeded = recovery_check_passed && phase != ExecutionPhase::Aborted;
        let recovery_status = RecoveryStatus::classify(succeeded, actions_completed, errors.len());
        let total_elapsed_ms = start.elapsed().as_millis() as u64;

        self.sink.emit(RecoveryEvent::ExecutionFinished {
            status: recovery_status,
            succeeded,
            elapsed_ms: total_elapsed_ms,
        });
        if succeeded {
            info!("Plan {} finished: {}", plan.name, recovery_status.as_str());
        } else {
            error!(
                "Plan {} did not recover the project ({} errors)",
                plan.name,
                errors.len()
            );
        }

        ExecutionResult {
            plan_name: plan.name.clone(),
            snapshot_id: snapshot.id.clone(),
            strategy: plan.strategy,
            succeeded,
            actions_completed,
            total_elapsed_ms,
            recovery_status,
            phase,
            recovery_check_passed,
            errors,
            actions: outcomes,
        }
    }

    async fn run_action(&self, action: &Action, errors: &mut Vec<String>) -> ActionOutcome {
        let start = Instant::now();
        self.sink.emit(RecoveryEvent::ActionStarted {
            sequence: action.sequence,
            description: action.description.clone(),
            command: action.command.as_ref().map(ToString::to_string),
        });

        // Descriptive steps have nothing to run and always succeed
        let primary_error = match &action.command {
            Some(command) => {
                let timeout = Duration::from_millis(action.timeout_ms);
                let output = if action.detached {
                    self.runner.spawn_detached(&self.invocation(command, timeout)).await
                } else {
                    self.runner.run(&self.invocation(command, timeout)).await
                };
                primary_failure(action, &output)
                    .map(|reason| format!("action {} ({}): {}", action.sequence, command, reason))
            }
            None => None,
        };
        if let Some(err) = &primary_error {
            warn!("{}", err);
            errors.push(err.clone());
        }

        let validation_passed = match &action.validation {
            Some(validation) => {
                let output = self
                    .runner
                    .run(&self.invocation(validation, self.validation_timeout))
                    .await;
                match failure(&output) {
                    None => Some(true),
                    Some(reason) => {
                        let err = format!(
                            "action {} validation ({}): {}",
                            action.sequence, validation, reason
                        );
                        warn!("{}", err);
                        self.sink.emit(RecoveryEvent::ValidationFailed {
                            sequence: action.sequence,
                            error: err.clone(),
                        });
                        errors.push(err);
                        Some(false)
                    }
                }
            }
            None => None,
        };

        let state = if primary_error.is_none() {
            ActionState::Succeeded
        } else {
            ActionState::Failed
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        self.sink.emit(RecoveryEvent::ActionFinished {
            sequence: action.sequence,
            state,
            duration_ms,
            error: primary_error,
        });

        ActionOutcome {
            sequence: action.sequence,
            description: action.description.clone(),
            state,
            validation_passed,
            duration_ms,
        }
    }

    /// Health check then every rollback validation; returns the failures
    async fn run_recovery_check(&self, plan: &RemediationPlan) -> Vec<String> {
        let check = &plan.recovery_check;
        let mut failures = Vec::new();

        for command in std::iter::once(&check.health_check).chain(check.rollback_validation.iter()) {
            let output = self
                .runner
                .run(&self.invocation(command, self.recovery_check_timeout))
                .await;
            if let Some(reason) = failure(&output) {
                failures.push(format!("recovery check ({}): {}", command, reason));
            }
        }

        self.sink.emit(RecoveryEvent::RecoveryCheckFinished {
            passed: failures.is_empty(),
            failures: failures.clone(),
        });
        failures
    }

    fn invocation(&self, command: &CommandSpec, timeout: Duration) -> CommandInvocation {
        CommandInvocation::new(command, timeout).in_dir(&self.project_root)
    }
}

fn failure(output: &CommandOutput) -> Option<String> {
    if output.success() {
        None
    } else {
        Some(output.failure_summary())
    }
}

/// Like `failure`, but honouring the action's accepted exit codes
fn primary_failure(action: &Action, output: &CommandOutput) -> Option<String> {
    match output.status {
        CommandStatus::Exited(code) if action.accepts_exit_code(code) => None,
        _ => Some(output.failure_summary()),
    }
}

fn transition(from: ExecutionPhase, to: ExecutionPhase) -> ExecutionPhase {
    debug_assert!(!from.is_terminal(), "no transition out of {:?}", from);
    debug!("Execution phase {:?} -> {:?}", from, to);
    to
}
