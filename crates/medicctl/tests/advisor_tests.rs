//! Tests for advisor.rs and snapshotter.rs

use medic_common::{
    select_plan, DataLoss, MedicConfig, MemorySink, PlanOverrides, ProcessStatus, RecoveryError,
    RecoveryEvent, RecoveryStatus, Severity, SourceSubsystem, StateSnapshot, StrategyName,
    SystemStability, Trigger, TriggerKind, WorkLoss,
};
use medicctl::{
    load_plan_file, EnvSource, ExecuteOptions, FakeCommandRunner, FakeResponse, RecoveryAdvisor,
    RecoveryOutcome, StateSnapshotter, StaticEnv,
};
use std::sync::Arc;

struct BrokenEnv;

impl EnvSource for BrokenEnv {
    fn get(&self, name: &str) -> Result<Option<String>, String> {
        Err(format!("{}: environment unreadable", name))
    }
}

fn quiet_config() -> MedicConfig {
    let mut config = MedicConfig::default();
    config.probes.skip_dev_server = true;
    config
}

fn advisor(fake: &FakeCommandRunner, config: MedicConfig, sink: &MemorySink) -> RecoveryAdvisor {
    RecoveryAdvisor::new(Arc::new(fake.clone()), config, Arc::new(sink.clone()))
        .with_env(Arc::new(StaticEnv::new([("NODE_ENV", "development")])))
}

fn build_failure() -> Trigger {
    Trigger::new(
        TriggerKind::BuildFailure,
        Severity::High,
        SourceSubsystem::Dependencies,
        "npm ls failed",
    )
}

#[tokio::test]
async fn test_snapshot_degrades_every_field() {
    let fake = FakeCommandRunner::failing_with(FakeResponse::missing());
    let sink = MemorySink::new();
    let snapshotter = StateSnapshotter::new(Arc::new(fake.clone()), &quiet_config(), Arc::new(sink.clone()))
        .with_env(Arc::new(BrokenEnv));

    let snapshot = snapshotter.capture_state().await;

    assert_eq!(snapshot.processes.dev_server.status, ProcessStatus::Stopped);
    assert!(!snapshot.files.workspace.clean);
    assert!(snapshot.environment.variables.is_empty());
    assert_eq!(snapshot.degraded, vec!["processes", "files", "environment"]);
    assert_eq!(sink.count(|e| matches!(e, RecoveryEvent::SnapshotDegraded { .. })), 3);
}

#[tokio::test]
async fn test_snapshot_captures_state() {
    let fake = FakeCommandRunner::new()
        .respond("ps -eo pid=,args=", FakeResponse::ok("  77 node node_modules/.bin/next dev\n"))
        .respond("git status --porcelain", FakeResponse::ok(" M package.json\n"));
    let sink = MemorySink::new();

    let snapshot = advisor(&fake, quiet_config(), &sink).capture_state().await;

    assert!(snapshot.dev_server_running());
    assert_eq!(snapshot.processes.dev_server.pid, Some(77));
    assert!(!snapshot.is_workspace_clean());
    assert_eq!(snapshot.files.workspace.uncommitted, vec!["package.json"]);
    assert_eq!(
        snapshot.environment.variables.get("NODE_ENV").map(String::as_str),
        Some("development")
    );
    assert!(!snapshot.is_degraded());
}

#[tokio::test]
async fn test_analyze_without_trigger_and_healthy_project() {
    let fake = FakeCommandRunner::new();
    let sink = MemorySink::new();

    let err = advisor(&fake, quiet_config(), &sink)
        .analyze_recovery(None, &PlanOverrides::default())
        .await
        .unwrap_err();

    assert!(matches!(err, RecoveryError::NoTriggerDetected));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_analyze_uses_most_severe_detected_trigger() {
    let fake = FakeCommandRunner::new()
        .respond("npm run --silent lint", FakeResponse::fail(1, "1 problem"))
        .respond("npm run --silent supervisor:health", FakeResponse::fail(1, "supervisor down"));
    let sink = MemorySink::new();

    let analysis = advisor(&fake, quiet_config(), &sink)
        .analyze_recovery(None, &PlanOverrides::default())
        .await
        .unwrap();

    assert_eq!(analysis.trigger.kind, TriggerKind::ProcessFailure);
    assert_eq!(analysis.plan.name, "process-failure");
}

#[tokio::test]
async fn test_analyze_build_failure() {
    let fake = FakeCommandRunner::new();
    let sink = MemorySink::new();

    let analysis = advisor(&fake, quiet_config(), &sink)
        .analyze_recovery(Some(build_failure()), &PlanOverrides::default())
        .await
        .unwrap();

    assert_eq!(analysis.plan.strategy, StrategyName::Staged);
    assert_eq!(analysis.plan.actions.len(), 4);
    assert!(analysis.plan.preserve_state);
    assert_eq!(
        analysis.estimated_recovery_time_ms,
        analysis.plan.estimated_duration_ms() + 30_000
    );
    // Empty porcelain output: clean tree
    assert_eq!(analysis.risk_assessment.data_loss, DataLoss::None);
    assert_eq!(analysis.risk_assessment.work_loss, WorkLoss::Minimal);
    assert_eq!(analysis.risk_assessment.system_stability, SystemStability::Stable);
    let alternatives: Vec<&str> = analysis.alternative_plans.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(alternatives, vec!["manual"]);
    assert_eq!(
        sink.count(|e| matches!(e, RecoveryEvent::PlanSelected { overridden: false, .. })),
        1
    );
}

#[tokio::test]
async fn test_analyze_critical_offers_nuclear() {
    let fake = FakeCommandRunner::new();
    let sink = MemorySink::new();
    let trigger = Trigger::operator(TriggerKind::ServerCrash, Severity::Critical);

    let analysis = advisor(&fake, quiet_config(), &sink)
        .analyze_recovery(
            Some(trigger),
            &PlanOverrides {
                strategy: Some(StrategyName::Graceful),
                preserve_state: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(analysis.plan.name, "server-crash");
    assert_eq!(analysis.plan.strategy, StrategyName::Graceful);
    assert_eq!(analysis.risk_assessment.system_stability, SystemStability::Unstable);
    assert_eq!(analysis.alternative_plans.len(), 2);
    assert_eq!(analysis.alternative_plans[1].name, "nuclear");
}

#[tokio::test]
async fn test_unconfirmed_execution_spawns_nothing() {
    let fake = FakeCommandRunner::new();
    let sink = MemorySink::new();
    let plan = select_plan(&build_failure(), &PlanOverrides::default());

    let outcome = advisor(&fake, quiet_config(), &sink)
        .execute_recovery(&plan, ExecuteOptions::default())
        .await
        .unwrap();

    assert!(matches!(outcome, RecoveryOutcome::ConfirmationRequired { .. }));
    assert_eq!(outcome.exit_code(), 3);
    assert_eq!(fake.total_calls(), 0);
    assert_eq!(
        sink.count(|e| matches!(e, RecoveryEvent::ConfirmationRequired { .. })),
        1
    );
}

#[tokio::test]
async fn test_dry_run_previews_build_failure_plan() {
    let fake = FakeCommandRunner::new();
    let sink = MemorySink::new();
    let plan = select_plan(&build_failure(), &PlanOverrides::default());

    let outcome = advisor(&fake, quiet_config(), &sink)
        .execute_recovery(
            &plan,
            ExecuteOptions {
                dry_run: true,
                confirmed: true,
            },
        )
        .await
        .unwrap();

    let preview = match outcome {
        RecoveryOutcome::DryRun(preview) => preview,
        other => panic!("expected dry run, got {:?}", other),
    };
    assert_eq!(preview.strategy, StrategyName::Staged);
    assert!(preview.preserve_state);
    assert_eq!(preview.steps.len(), 4);
    assert!(preview.steps.iter().all(|s| s.command.is_some()));
    assert_eq!(preview.steps[1].command.as_deref(), Some("npm ci"));
    assert_eq!(preview.estimated_time_ms, plan.estimated_duration_ms());
    assert_eq!(preview.estimated_time_ms, 330_000);
    assert_eq!(fake.total_calls(), 0);
}

#[tokio::test]
async fn test_confirmed_execution_reports_before_and_after() {
    let state_dir = tempfile::tempdir().unwrap();
    let mut config = quiet_config();
    config.snapshot.state_dir = Some(state_dir.path().join("snapshots"));

    let fake = FakeCommandRunner::new();
    let sink = MemorySink::new();
    let plan = select_plan(&build_failure(), &PlanOverrides::default());

    let outcome = advisor(&fake, config, &sink)
        .execute_recovery(
            &plan,
            ExecuteOptions {
                dry_run: false,
                confirmed: true,
            },
        )
        .await
        .unwrap();

    let report = match &outcome {
        RecoveryOutcome::Executed(report) => report,
        other => panic!("expected execution, got {:?}", other),
    };
    assert!(report.result.succeeded);
    assert_eq!(report.result.recovery_status, RecoveryStatus::Complete);
    assert_eq!(report.result.snapshot_id, report.before.id);
    assert_ne!(report.before.id, report.after.id);
    assert_eq!(outcome.exit_code(), 0);

    let preserved = report.preserved_snapshot.as_ref().unwrap();
    let saved: StateSnapshot =
        serde_json::from_str(&std::fs::read_to_string(preserved).unwrap()).unwrap();
    assert_eq!(saved.id, report.before.id);

    // Snapshots before and after, plus every plan command
    assert!(fake.was_called("npm ci"));
    assert_eq!(fake.call_count("ps -eo pid=,args="), 2);
}

#[tokio::test]
async fn test_preserve_override_skips_persistence() {
    let state_dir = tempfile::tempdir().unwrap();
    let mut config = quiet_config();
    config.snapshot.state_dir = Some(state_dir.path().to_path_buf());

    let fake = FakeCommandRunner::new();
    let sink = MemorySink::new();
    let plan = select_plan(
        &build_failure(),
        &PlanOverrides {
            strategy: None,
            preserve_state: Some(false),
        },
    );

    let outcome = advisor(&fake, config, &sink)
        .execute_recovery(
            &plan,
            ExecuteOptions {
                dry_run: false,
                confirmed: true,
            },
        )
        .await
        .unwrap();

    match outcome {
        RecoveryOutcome::Executed(report) => assert!(report.preserved_snapshot.is_none()),
        other => panic!("expected execution, got {:?}", other),
    }
    assert_eq!(std::fs::read_dir(state_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_invalid_plan_rejected() {
    let fake = FakeCommandRunner::new();
    let sink = MemorySink::new();
    let mut plan = select_plan(&build_failure(), &PlanOverrides::default());
    plan.actions[2].sequence = 1;

    let err = advisor(&fake, quiet_config(), &sink)
        .execute_recovery(
            &plan,
            ExecuteOptions {
                dry_run: true,
                confirmed: false,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RecoveryError::InvalidPlan(_)));
    assert_eq!(fake.total_calls(), 0);
}

#[test]
fn test_load_plan_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.json");
    std::fs::write(
        &path,
        r#"{
            "name": "custom",
            "strategy": "immediate",
            "preserveState": false,
            "actions": [
                {"sequence": 1, "description": "Clear turbo cache", "command": {"program": "rm", "args": ["-rf", ".turbo"]}},
                {"sequence": 2, "description": "Rebuild", "command": {"program": "npm", "args": ["run", "build"]}, "timeoutMs": 90000}
            ],
            "recoveryCheck": {"healthCheck": {"program": "npx", "args": ["tsc", "--noEmit"]}}
        }"#,
    )
    .unwrap();

    let plan = load_plan_file(&path).unwrap();
    assert_eq!(plan.strategy, StrategyName::Immediate);
    assert_eq!(plan.actions[0].timeout_ms, 30_000);
    assert_eq!(plan.estimated_duration_ms(), 120_000);

    let missing = load_plan_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(missing, RecoveryError::PlanFile { .. }));

    std::fs::write(&path, r#"{"name": "empty", "strategy": "graceful", "preserveState": true, "actions": [], "recoveryCheck": {"healthCheck": {"program": "true"}}}"#).unwrap();
    assert!(matches!(load_plan_file(&path), Err(RecoveryError::InvalidPlan(_))));
}
