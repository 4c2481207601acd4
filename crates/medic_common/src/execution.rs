//! Execution results and dry-run previews

use crate::plan::{RemediationPlan, StrategyName};
use serde::{Deserialize, Serialize};

/// Executor state machine: pending -> running -> completed | partial | aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPhase {
    Pending,
    Running,
    /// Every action ran and none failed
    Completed,
    /// Every action ran, some failed
    Partial,
    /// An immediate-strategy plan stopped at its first failure
    Aborted,
}

impl ExecutionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionPhase::Completed | ExecutionPhase::Partial | ExecutionPhase::Aborted
        )
    }
}

/// Overall verdict reported to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStatus {
    Complete,
    Partial,
    Failed,
}

impl RecoveryStatus {
    /// complete: succeeded with no errors; failed: did not succeed and
    /// nothing completed; partial: everything else
    pub fn classify(succeeded: bool, actions_completed: usize, error_count: usize) -> Self {
        if succeeded && error_count == 0 {
            RecoveryStatus::Complete
        } else if !succeeded && actions_completed == 0 {
            RecoveryStatus::Failed
        } else {
            RecoveryStatus::Partial
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryStatus::Complete => "complete",
            RecoveryStatus::Partial => "partial",
            RecoveryStatus::Failed => "failed",
        }
    }
}

/// What happened to one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    Succeeded,
    Failed,
    /// Not run because an earlier action aborted the plan
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub sequence: u32,
    pub description: String,
    pub state: ActionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_passed: Option<bool>,
    pub duration_ms: u64,
}

/// Outcome of running a remediation plan. Produced once, never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub plan_name: String,
    /// Snapshot the plan was executed against
    pub snapshot_id: String,
    pub strategy: StrategyName,
    pub succeeded: bool,
    pub actions_completed: usize,
    pub total_elapsed_ms: u64,
    pub recovery_status: RecoveryStatus,
    pub phase: ExecutionPhase,
    pub recovery_check_passed: bool,
    /// Per-action error strings, in execution order
    pub errors: Vec<String>,
    pub actions: Vec<ActionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewStep {
    pub sequence: u32,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    pub timeout_ms: u64,
    pub detached: bool,
}

/// Intended actions of a plan, reported without running anything
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunPreview {
    pub plan_name: String,
    pub strategy: StrategyName,
    pub preserve_state: bool,
    pub steps: Vec<PreviewStep>,
    pub health_check: String,
    pub rollback_validation: Vec<String>,
    /// Sum of every step's time budget
    pub estimated_time_ms: u64,
}

impl DryRunPreview {
    pub fn from_plan(plan: &RemediationPlan) -> Self {
        let steps = plan
            .actions
            .iter()
            .map(|action| PreviewStep {
                sequence: action.sequence,
                description: action.description.clone(),
                command: action.command.as_ref().map(ToString::to_string),
                validation: action.validation.as_ref().map(ToString::to_string),
                timeout_ms: action.timeout_ms,
                detached: action.detached,
            })
            .collect();

        Self {
            plan_name: plan.name.clone(),
            strategy: plan.strategy,
            preserve_state: plan.preserve_state,
            steps,
            health_check: plan.recovery_check.health_check.to_string(),
            rollback_validation: plan
                .recovery_check
                .rollback_validation
                .iter()
                .map(ToString::to_string)
                .collect(),
            estimated_time_ms: plan.estimated_duration_ms(),
        }
    }
}
