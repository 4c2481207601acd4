//! Remediation plans, actions and recovery checks

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fallback time budget for an action that does not declare one
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 30_000;

fn default_action_timeout_ms() -> u64 {
    DEFAULT_ACTION_TIMEOUT_MS
}

/// Recovery strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyName {
    /// Abort on the first failing action
    Immediate,
    Graceful,
    Staged,
    Minimal,
}

impl StrategyName {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyName::Immediate => "immediate",
            StrategyName::Graceful => "graceful",
            StrategyName::Staged => "staged",
            StrategyName::Minimal => "minimal",
        }
    }

    /// Whether the first action failure stops the plan
    pub fn aborts_on_failure(self) -> bool {
        matches!(self, StrategyName::Immediate)
    }
}

impl FromStr for StrategyName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "immediate" => Ok(StrategyName::Immediate),
            "graceful" => Ok(StrategyName::Graceful),
            "staged" => Ok(StrategyName::Staged),
            "minimal" => Ok(StrategyName::Minimal),
            other => Err(format!(
                "unknown strategy '{}' (expected immediate, graceful, staged or minimal)",
                other
            )),
        }
    }
}

impl fmt::Display for StrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A program and its argument vector. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from a static argv slice, first element is the program
    pub fn from_argv(argv: &[&str]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(*program, args.iter().copied()))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// One remediation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// 1-based execution position
    pub sequence: u32,
    pub description: String,
    /// Absent for purely descriptive steps
    #[serde(default)]
    pub command: Option<CommandSpec>,
    #[serde(default)]
    pub validation: Option<CommandSpec>,
    #[serde(default = "default_action_timeout_ms")]
    pub timeout_ms: u64,
    /// Start the command and return without waiting for it to exit
    #[serde(default)]
    pub detached: bool,
    /// Non-zero exit codes that still count as success (`pkill` exits 1
    /// when nothing matched)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ok_exit_codes: Vec<i32>,
}

impl Action {
    /// Whether `code` is a successful exit for this action
    pub fn accepts_exit_code(&self, code: i32) -> bool {
        code == 0 || self.ok_exit_codes.contains(&code)
    }
}

/// Commands that decide whether a plan actually fixed the problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryCheck {
    pub health_check: CommandSpec,
    #[serde(default)]
    pub rollback_validation: Vec<CommandSpec>,
}

/// Caller preferences applied on top of the table entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOverrides {
    #[serde(default)]
    pub strategy: Option<StrategyName>,
    #[serde(default)]
    pub preserve_state: Option<bool>,
}

impl PlanOverrides {
    pub fn is_empty(&self) -> bool {
        self.strategy.is_none() && self.preserve_state.is_none()
    }
}

/// Named, ordered sequence of actions selected for a trigger kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationPlan {
    /// Table key the plan was built from
    pub name: String,
    pub strategy: StrategyName,
    pub preserve_state: bool,
    pub actions: Vec<Action>,
    pub recovery_check: RecoveryCheck,
}

impl RemediationPlan {
    /// Apply caller overrides.
    ///
    /// Only the strategy and preserve-state flag change; the action list
    /// belongs to the trigger kind and is never rewritten here.
    pub fn with_overrides(mut self, overrides: &PlanOverrides) -> Self {
        if let Some(strategy) = overrides.strategy {
            self.strategy = strategy;
        }
        if let Some(preserve) = overrides.preserve_state {
            self.preserve_state = preserve;
        }
        self
    }

    /// Worst-case duration: sum of every action's time budget
    pub fn estimated_duration_ms(&self) -> u64 {
        self.actions.iter().map(|a| a.timeout_ms).sum()
    }

    /// Check the structural invariants a caller-built plan must satisfy
    pub fn validate(&self) -> Result<(), String> {
        if self.actions.is_empty() {
            return Err(format!("plan '{}' has no actions", self.name));
        }

        let mut previous = 0u32;
        for action in &self.actions {
            if action.sequence == 0 {
                return Err(format!(
                    "plan '{}': action '{}' has sequence 0 (sequences are 1-based)",
                    self.name, action.description
                ));
            }
            if action.sequence <= previous {
                return Err(format!(
                    "plan '{}': sequence {} follows {} (must be strictly increasing)",
                    self.name, action.sequence, previous
                ));
            }
            if action.timeout_ms == 0 {
                return Err(format!(
                    "plan '{}': action {} has a zero timeout",
                    self.name, action.sequence
                ));
            }
            previous = action.sequence;
        }

        Ok(())
    }

    /// Every command the plan could spawn, in execution order
    pub fn commands(&self) -> Vec<&CommandSpec> {
        let mut commands = Vec::new();
        for action in &self.actions {
            commands.extend(action.command.iter());
            commands.extend(action.validation.iter());
        }
        commands.push(&self.recovery_check.health_check);
        commands.extend(self.recovery_check.rollback_validation.iter());
        commands
    }
}
