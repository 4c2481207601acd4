//! Tests for plan_table.rs

use medic_common::{
    plan_for_key, plan_keys, select_plan, PlanOverrides, Severity, SourceSubsystem,
    StrategyName, Trigger, TriggerKind,
};

const TABLE_KINDS: [TriggerKind; 6] = [
    TriggerKind::ProcessFailure,
    TriggerKind::HookTimeout,
    TriggerKind::BuildFailure,
    TriggerKind::TestFailure,
    TriggerKind::ServerCrash,
    TriggerKind::Manual,
];

fn trigger(kind: TriggerKind, severity: Severity) -> Trigger {
    Trigger::new(kind, severity, SourceSubsystem::Operator, "test")
}

#[test]
fn test_every_kind_has_ordered_actions() {
    for kind in TABLE_KINDS {
        let plan = select_plan(&trigger(kind.clone(), Severity::High), &PlanOverrides::default());

        assert_eq!(plan.name, kind.as_str());
        assert!(!plan.actions.is_empty(), "{} has no actions", kind);
        assert_eq!(plan.actions[0].sequence, 1, "{} does not start at 1", kind);
        for pair in plan.actions.windows(2) {
            assert!(
                pair[1].sequence > pair[0].sequence,
                "{}: sequence {} follows {}",
                kind,
                pair[1].sequence,
                pair[0].sequence
            );
        }
        assert!(plan.actions.iter().all(|a| a.timeout_ms > 0));
    }
}

#[test]
fn test_unknown_kinds_get_fallback() {
    for raw in ["disk-full", "", "BUILD_FAILURE", "system-failure"] {
        let kind: TriggerKind = raw.parse().unwrap();
        let plan = select_plan(&trigger(kind, Severity::Medium), &PlanOverrides::default());
        assert_eq!(plan.name, "fallback", "kind '{}' did not fall back", raw);
        assert!(!plan.actions.is_empty());
    }
}

#[test]
fn test_table_keys_are_not_selectable_as_kinds() {
    // "nuclear" is an alternative plan, not a trigger kind
    let kind: TriggerKind = "nuclear".parse().unwrap();
    let plan = select_plan(&trigger(kind, Severity::Critical), &PlanOverrides::default());
    assert_eq!(plan.name, "fallback");
}

#[test]
fn test_build_failure_row() {
    let plan = select_plan(
        &trigger(TriggerKind::BuildFailure, Severity::High),
        &PlanOverrides::default(),
    );

    assert_eq!(plan.strategy, StrategyName::Staged);
    assert!(plan.preserve_state);
    assert_eq!(plan.actions.len(), 4);
    assert!(plan
        .actions
        .iter()
        .all(|a| (30_000..=120_000).contains(&a.timeout_ms)));

    let programs: Vec<String> = plan
        .actions
        .iter()
        .map(|a| a.command.as_ref().unwrap().to_string())
        .collect();
    assert_eq!(
        programs,
        vec!["rm -rf .next", "npm ci", "npx tsc --noEmit", "npm run build"]
    );
}

#[test]
fn test_strategy_override_keeps_action_list() {
    let base = select_plan(
        &trigger(TriggerKind::BuildFailure, Severity::High),
        &PlanOverrides::default(),
    );
    let overridden = select_plan(
        &trigger(TriggerKind::BuildFailure, Severity::High),
        &PlanOverrides {
            strategy: Some(StrategyName::Immediate),
            preserve_state: None,
        },
    );

    assert_eq!(overridden.strategy, StrategyName::Immediate);
    assert_eq!(overridden.preserve_state, base.preserve_state);
    assert_eq!(overridden.actions, base.actions);
    assert_eq!(overridden.recovery_check, base.recovery_check);
}

#[test]
fn test_preserve_state_override() {
    let plan = select_plan(
        &trigger(TriggerKind::ServerCrash, Severity::Critical),
        &PlanOverrides {
            strategy: None,
            preserve_state: Some(true),
        },
    );
    assert_eq!(plan.strategy, StrategyName::Immediate);
    assert!(plan.preserve_state);
}

#[test]
fn test_plans_are_fresh_values() {
    let mut first = plan_for_key("manual").unwrap();
    first.actions.clear();
    let second = plan_for_key("manual").unwrap();
    assert_eq!(second.actions.len(), 3);
}

#[test]
fn test_table_lists_all_rows() {
    let keys = plan_keys();
    for kind in TABLE_KINDS {
        assert!(keys.contains(&kind.as_str()), "missing row {}", kind);
    }
    assert!(keys.contains(&"fallback"));
    assert!(keys.contains(&"nuclear"));
}
