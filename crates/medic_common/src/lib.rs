//! Medic Common - Shared types for the recovery advisor
//!
//! Pure data: triggers, remediation plans, snapshots, execution results,
//! risk heuristics, events and configuration. Nothing in this crate spawns
//! processes.

pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod plan;
pub mod plan_table;
pub mod risk;
pub mod snapshot;
pub mod trigger;

pub use config::MedicConfig;
pub use error::{ConfigError, RecoveryError};
pub use events::{EventSink, MemorySink, NullSink, RecoveryEvent};
pub use execution::{
    ActionOutcome, ActionState, DryRunPreview, ExecutionPhase, ExecutionResult, PreviewStep,
    RecoveryStatus,
};
pub use plan::{
    Action, CommandSpec, PlanOverrides, RecoveryCheck, RemediationPlan, StrategyName,
    DEFAULT_ACTION_TIMEOUT_MS,
};
pub use plan_table::{nuclear_plan, plan_for_key, plan_keys, select_plan};
pub use risk::{assess_risk, DataLoss, RiskAssessment, SystemStability, WorkLoss};
pub use snapshot::{compare_snapshots, ProcessStatus, StateSnapshot};
pub use trigger::{rank_triggers, Severity, SourceSubsystem, Trigger, TriggerKind};
