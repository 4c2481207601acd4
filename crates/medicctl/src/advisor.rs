//! Recovery advisor - orchestrates detection, plan selection, snapshots and execution
//!
//! `analyze_recovery` answers "what would you do"; `execute_recovery` does
//! it, behind the dry-run and confirmation gates.

use crate::detector::{ProbeSpec, TriggerDetector};
use crate::executor::PlanExecutor;
use crate::runner::CommandRunner;
use crate::snapshotter::{EnvSource, StateSnapshotter};
use medic_common::plan_table::{plan_for_key, NUCLEAR_KEY};
use medic_common::{
    compare_snapshots, select_plan, DryRunPreview, EventSink, ExecutionResult, MedicConfig,
    PlanOverrides, RecoveryError, RecoveryEvent, RemediationPlan, RiskAssessment, StateSnapshot,
    StrategyName, Trigger, TriggerKind,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Everything the advisor would do for a trigger, without doing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryAnalysis {
    pub trigger: Trigger,
    pub plan: RemediationPlan,
    pub snapshot: StateSnapshot,
    /// Sum of action timeouts plus the configured buffer
    pub estimated_recovery_time_ms: u64,
    pub risk_assessment: RiskAssessment,
    pub alternative_plans: Vec<RemediationPlan>,
}

/// Gates for `execute_recovery`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Report intended actions only; wins over `confirmed`
    pub dry_run: bool,
    /// Operator approved execution
    pub confirmed: bool,
}

/// Result of an executed plan with before/after state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    pub result: ExecutionResult,
    pub before: StateSnapshot,
    pub after: StateSnapshot,
    /// Observable differences between the two snapshots
    pub changes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserved_snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RecoveryOutcome {
    DryRun(DryRunPreview),
    ConfirmationRequired {
        plan: String,
        strategy: StrategyName,
        actions: usize,
    },
    Executed(RecoveryReport),
}

impl RecoveryOutcome {
    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            RecoveryOutcome::DryRun(_) => 0,
            RecoveryOutcome::ConfirmationRequired { .. } => 3,
            RecoveryOutcome::Executed(report) if report.result.succeeded => 0,
            RecoveryOutcome::Executed(_) => 4,
        }
    }
}

pub struct RecoveryAdvisor {
    config: MedicConfig,
    detector: TriggerDetector,
    snapshotter: StateSnapshotter,
    executor: PlanExecutor,
    sink: Arc<dyn EventSink>,
}

impl RecoveryAdvisor {
    pub fn new(runner: Arc<dyn CommandRunner>, config: MedicConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            detector: TriggerDetector::new(Arc::clone(&runner), &config, Arc::clone(&sink)),
            snapshotter: StateSnapshotter::new(Arc::clone(&runner), &config, Arc::clone(&sink)),
            executor: PlanExecutor::new(runner, &config, Arc::clone(&sink)),
            config,
            sink,
        }
    }

    /// Read environment variables from `env` instead of the process
    pub fn with_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.snapshotter = self.snapshotter.with_env(env);
        self
    }

    pub fn with_probes(mut self, probes: Vec<ProbeSpec>) -> Self {
        self.detector = self.detector.with_probes(probes);
        self
    }

    pub fn config(&self) -> &MedicConfig {
        &self.config
    }

    pub async fn detect_triggers(&self) -> Vec<Trigger> {
        self.detector.detect_triggers().await
    }

    pub async fn capture_state(&self) -> StateSnapshot {
        self.snapshotter.capture_state().await
    }

    /// Pick a plan for `trigger`, or for the most severe detected trigger
    /// when none is given.
    pub async fn analyze_recovery(
        &self,
        trigger: Option<Trigger>,
        overrides: &PlanOverrides,
    ) -> Result<RecoveryAnalysis, RecoveryError> {
        let trigger = match trigger {
            Some(trigger) => trigger,
            None => self
                .detect_triggers()
                .await
                .into_iter()
                .next()
                .ok_or(RecoveryError::NoTriggerDetected)?,
        };

        let plan = select_plan(&trigger, overrides);
        self.sink.emit(RecoveryEvent::PlanSelected {
            plan: plan.name.clone(),
            trigger: trigger.kind.clone(),
            strategy: plan.strategy,
            overridden: !overrides.is_empty(),
        });

        let snapshot = self.capture_state().await;
        let risk_assessment = RiskAssessment::from_snapshot(trigger.severity, &snapshot);
        let estimated_recovery_time_ms =
            plan.estimated_duration_ms() + self.config.execution.estimate_buffer_ms;
        let alternative_plans = alternative_plans(&trigger);

        info!(
            "Analysis for {} ({}): plan {}, estimate {}ms",
            trigger.kind, trigger.severity, plan.name, estimated_recovery_time_ms
        );

        Ok(RecoveryAnalysis {
            trigger,
            plan,
            snapshot,
            estimated_recovery_time_ms,
            risk_assessment,
            alternative_plans,
        })
    }

    /// Execute `plan` if allowed.
    ///
    /// Dry run returns a preview; without confirmation nothing runs. Neither
    /// path spawns a process.
    pub async fn execute_recovery(
        &self,
        plan: &RemediationPlan,
        options: ExecuteOptions,
    ) -> Result<RecoveryOutcome, RecoveryError> {
        plan.validate().map_err(RecoveryError::InvalidPlan)?;

        if options.dry_run {
            return Ok(RecoveryOutcome::DryRun(DryRunPreview::from_plan(plan)));
        }

        if !options.confirmed {
            self.sink.emit(RecoveryEvent::ConfirmationRequired {
                plan: plan.name.clone(),
            });
            return Ok(RecoveryOutcome::ConfirmationRequired {
                plan: plan.name.clone(),
                strategy: plan.strategy,
                actions: plan.actions.len(),
            });
        }

        let before = self.capture_state().await;
        let preserved_snapshot = if plan.preserve_state {
            self.snapshotter.preserve(&before).await
        } else {
            None
        };

        let result = self.executor.execute(plan, &before).await;

        let after = self.capture_state().await;
        let changes = compare_snapshots(&before, &after);

        Ok(RecoveryOutcome::Executed(RecoveryReport {
            result,
            before,
            after,
            changes,
            preserved_snapshot,
        }))
    }
}

/// Manual review unless already manual; the nuclear option for critical triggers
fn alternative_plans(trigger: &Trigger) -> Vec<RemediationPlan> {
    let mut alternatives = Vec::new();
    if trigger.kind != TriggerKind::Manual {
        alternatives.extend(plan_for_key("manual"));
    }
    if trigger.is_critical() {
        alternatives.extend(plan_for_key(NUCLEAR_KEY));
    }
    alternatives
}

/// Load a caller-built plan from a JSON file and check its invariants
pub fn load_plan_file(path: &Path) -> Result<RemediationPlan, RecoveryError> {
    let content = std::fs::read_to_string(path).map_err(|e| RecoveryError::PlanFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let plan: RemediationPlan =
        serde_json::from_str(&content).map_err(|e| RecoveryError::PlanFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    plan.validate().map_err(RecoveryError::InvalidPlan)?;
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_common::{Severity, SourceSubsystem};

    #[test]
    fn test_alternatives() {
        let manual = Trigger::operator(TriggerKind::Manual, Severity::Low);
        assert!(alternative_plans(&manual).is_empty());

        let crash = Trigger::new(
            TriggerKind::ServerCrash,
            Severity::Critical,
            SourceSubsystem::DevServer,
            "down",
        );
        let names: Vec<String> = alternative_plans(&crash).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["manual", "nuclear"]);
    }

    #[test]
    fn test_outcome_exit_codes() {
        let outcome = RecoveryOutcome::ConfirmationRequired {
            plan: "manual".to_string(),
            strategy: StrategyName::Graceful,
            actions: 3,
        };
        assert_eq!(outcome.exit_code(), 3);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "confirmation-required");
    }
}
