//! Plan table - trigger kind to remediation plan template
//!
//! One declarative table. Each entry is instantiated fresh per request, so
//! no plan value is ever shared between callers.

use crate::plan::{Action, CommandSpec, PlanOverrides, RecoveryCheck, RemediationPlan, StrategyName};
use crate::trigger::Trigger;

/// Key of the entry used for any kind without its own row
pub const FALLBACK_KEY: &str = "fallback";

/// Key of the full dependency wipe offered for critical triggers
pub const NUCLEAR_KEY: &str = "nuclear";

struct ActionTemplate {
    description: &'static str,
    command: &'static [&'static str],
    validation: &'static [&'static str],
    timeout_ms: u64,
    detached: bool,
    ok_exit_codes: &'static [i32],
}

struct PlanTemplate {
    key: &'static str,
    strategy: StrategyName,
    preserve_state: bool,
    actions: &'static [ActionTemplate],
    health_check: &'static [&'static str],
    rollback_validation: &'static [&'static [&'static str]],
}

const fn step(description: &'static str, command: &'static [&'static str], timeout_ms: u64) -> ActionTemplate {
    ActionTemplate {
        description,
        command,
        validation: &[],
        timeout_ms,
        detached: false,
        ok_exit_codes: &[],
    }
}

const fn checked(
    description: &'static str,
    command: &'static [&'static str],
    validation: &'static [&'static str],
    timeout_ms: u64,
) -> ActionTemplate {
    ActionTemplate {
        description,
        command,
        validation,
        timeout_ms,
        detached: false,
        ok_exit_codes: &[],
    }
}

const fn background(description: &'static str, command: &'static [&'static str], timeout_ms: u64) -> ActionTemplate {
    ActionTemplate {
        description,
        command,
        validation: &[],
        timeout_ms,
        detached: true,
        ok_exit_codes: &[],
    }
}

/// `pkill` exits 1 when no process matched, which is the usual case here
const fn stop(description: &'static str, command: &'static [&'static str], timeout_ms: u64) -> ActionTemplate {
    ActionTemplate {
        description,
        command,
        validation: &[],
        timeout_ms,
        detached: false,
        ok_exit_codes: &[1],
    }
}

const NPM_LS: &[&str] = &["npm", "ls", "--depth=0"];
const TYPE_CHECK: &[&str] = &["npx", "tsc", "--noEmit"];
const LINT: &[&str] = &["npm", "run", "--silent", "lint"];
const BUILD: &[&str] = &["npm", "run", "build"];
const DEV_SERVER: &[&str] = &["npm", "run", "dev"];
const STOP_DEV_SERVER: &[&str] = &["pkill", "-f", "next dev"];
const GIT_STATUS: &[&str] = &["git", "status", "--porcelain"];

const PLAN_TABLE: &[PlanTemplate] = &[
    PlanTemplate {
        key: "process-failure",
        strategy: StrategyName::Graceful,
        preserve_state: true,
        actions: &[
            stop("Stop stale dev server processes", STOP_DEV_SERVER, 10_000),
            step("Verify installed dependency tree", NPM_LS, 30_000),
            background("Restart development server", DEV_SERVER, 15_000),
        ],
        health_check: NPM_LS,
        rollback_validation: &[GIT_STATUS],
    },
    PlanTemplate {
        key: "hook-timeout",
        strategy: StrategyName::Immediate,
        preserve_state: false,
        actions: &[
            stop("Terminate hung npm exec processes", &["pkill", "-f", "npm exec"], 10_000),
            step("Verify npm cache integrity", &["npm", "cache", "verify"], 60_000),
            step("Re-run type check", TYPE_CHECK, 60_000),
        ],
        health_check: TYPE_CHECK,
        rollback_validation: &[],
    },
    PlanTemplate {
        key: "build-failure",
        strategy: StrategyName::Staged,
        preserve_state: true,
        actions: &[
            step("Clean build output", &["rm", "-rf", ".next"], 30_000),
            checked("Reinstall dependencies", &["npm", "ci"], NPM_LS, 120_000),
            step("Run type check", TYPE_CHECK, 60_000),
            step("Run full build", BUILD, 120_000),
        ],
        health_check: TYPE_CHECK,
        rollback_validation: &[LINT],
    },
    PlanTemplate {
        key: "test-failure",
        strategy: StrategyName::Graceful,
        preserve_state: true,
        actions: &[
            step("Clear test runner cache", &["npx", "jest", "--clearCache"], 30_000),
            step("Run type check", TYPE_CHECK, 60_000),
            step("Run unit tests", &["npm", "test", "--", "--ci"], 120_000),
        ],
        health_check: TYPE_CHECK,
        rollback_validation: &[GIT_STATUS],
    },
    PlanTemplate {
        key: "server-crash",
        strategy: StrategyName::Immediate,
        preserve_state: false,
        actions: &[
            stop("Kill crashed dev server", STOP_DEV_SERVER, 10_000),
            step("Clean dev server cache", &["rm", "-rf", ".next/cache"], 30_000),
            background("Restart development server", DEV_SERVER, 15_000),
        ],
        health_check: NPM_LS,
        rollback_validation: &[],
    },
    PlanTemplate {
        key: "manual",
        strategy: StrategyName::Graceful,
        preserve_state: true,
        actions: &[
            step("Review uncommitted working tree changes", GIT_STATUS, 10_000),
            step("Inspect recent commits", &["git", "log", "--oneline", "-5"], 10_000),
            step("Decide on remediation with the operator", &[], 5_000),
        ],
        health_check: GIT_STATUS,
        rollback_validation: &[],
    },
    PlanTemplate {
        key: FALLBACK_KEY,
        strategy: StrategyName::Graceful,
        preserve_state: true,
        actions: &[
            step("Verify installed dependency tree", NPM_LS, 30_000),
            step("Run type check", TYPE_CHECK, 60_000),
        ],
        health_check: TYPE_CHECK,
        rollback_validation: &[],
    },
    PlanTemplate {
        key: NUCLEAR_KEY,
        strategy: StrategyName::Minimal,
        preserve_state: true,
        actions: &[
            stop("Stop dev server", STOP_DEV_SERVER, 10_000),
            step("Wipe installed dependencies and build output", &["rm", "-rf", "node_modules", ".next"], 60_000),
            checked("Reinstall dependencies from scratch", &["npm", "install"], NPM_LS, 180_000),
            step("Run full build", BUILD, 120_000),
        ],
        health_check: TYPE_CHECK,
        rollback_validation: &[LINT],
    },
];

impl PlanTemplate {
    fn instantiate(&self) -> RemediationPlan {
        let actions = self
            .actions
            .iter()
            .enumerate()
            .map(|(index, template)| Action {
                sequence: index as u32 + 1,
                description: template.description.to_string(),
                command: CommandSpec::from_argv(template.command),
                validation: CommandSpec::from_argv(template.validation),
                timeout_ms: template.timeout_ms,
                detached: template.detached,
                ok_exit_codes: template.ok_exit_codes.to_vec(),
            })
            .collect();

        // Every row declares a non-empty health check
        let health_check = CommandSpec::from_argv(self.health_check)
            .unwrap_or_else(|| CommandSpec::new("true", Vec::<String>::new()));

        RemediationPlan {
            name: self.key.to_string(),
            strategy: self.strategy,
            preserve_state: self.preserve_state,
            actions,
            recovery_check: RecoveryCheck {
                health_check,
                rollback_validation: self
                    .rollback_validation
                    .iter()
                    .filter_map(|argv| CommandSpec::from_argv(argv))
                    .collect(),
            },
        }
    }
}

/// Build the plan stored under `key`, if the table has one
pub fn plan_for_key(key: &str) -> Option<RemediationPlan> {
    PLAN_TABLE
        .iter()
        .find(|template| template.key == key)
        .map(PlanTemplate::instantiate)
}

/// All table keys, in table order
pub fn plan_keys() -> Vec<&'static str> {
    PLAN_TABLE.iter().map(|template| template.key).collect()
}

fn fallback_plan() -> RemediationPlan {
    PLAN_TABLE
        .iter()
        .find(|template| template.key == FALLBACK_KEY)
        .map(PlanTemplate::instantiate)
        .unwrap_or_else(|| PLAN_TABLE[0].instantiate())
}

/// Select the remediation plan for a trigger.
///
/// Kinds without a row (including `system-failure`) resolve to the fallback
/// entry, so this never fails. Overrides change strategy and preserve-state
/// only.
pub fn select_plan(trigger: &Trigger, overrides: &PlanOverrides) -> RemediationPlan {
    let key = trigger.kind.as_str();
    let plan = match key {
        FALLBACK_KEY | NUCLEAR_KEY => None,
        _ => plan_for_key(key),
    }
    .unwrap_or_else(fallback_plan);

    plan.with_overrides(overrides)
}

/// Full dependency wipe and reinstall
pub fn nuclear_plan() -> RemediationPlan {
    plan_for_key(NUCLEAR_KEY).unwrap_or_else(fallback_plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_keys_are_unique() {
        let mut keys = plan_keys();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }

    #[test]
    fn test_every_row_is_valid() {
        for key in plan_keys() {
            let plan = plan_for_key(key).unwrap();
            assert!(plan.validate().is_ok(), "row {} is invalid", key);
            assert_eq!(plan.name, key);
        }
    }

    #[test]
    fn test_descriptive_step_has_no_command() {
        let plan = plan_for_key("manual").unwrap();
        assert!(plan.actions[2].command.is_none());
    }

    #[test]
    fn test_nuclear_is_minimal() {
        let plan = nuclear_plan();
        assert_eq!(plan.strategy, StrategyName::Minimal);
        assert!(plan
            .actions
            .iter()
            .any(|a| a.command.as_ref().is_some_and(|c| c.args.contains(&"node_modules".to_string()))));
    }

    #[test]
    fn test_pkill_steps_tolerate_no_match() {
        for key in plan_keys() {
            let plan = plan_for_key(key).unwrap();
            for action in &plan.actions {
                if action.command.as_ref().is_some_and(|c| c.program == "pkill") {
                    assert!(action.accepts_exit_code(1), "{} step {}", key, action.sequence);
                } else {
                    assert!(action.ok_exit_codes.is_empty(), "{} step {}", key, action.sequence);
                }
            }
        }
    }
}
