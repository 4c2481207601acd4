//! Triggers - observed abnormal conditions that may need remediation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of abnormal condition
///
/// Parsing never fails: anything unrecognised becomes `Unknown` and is
/// routed to the fallback plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TriggerKind {
    /// A supervised process exited or reported unhealthy
    ProcessFailure,
    /// A command exceeded its time budget
    HookTimeout,
    /// Dependency, type-check, lint or build failure
    BuildFailure,
    /// Test suite failure
    TestFailure,
    /// The dev server is not answering
    ServerCrash,
    /// Operator-requested recovery
    Manual,
    /// A probe could not be invoked at all
    SystemFailure,
    /// Caller-supplied kind with no table entry
    Unknown(String),
}

impl TriggerKind {
    pub fn as_str(&self) -> &str {
        match self {
            TriggerKind::ProcessFailure => "process-failure",
            TriggerKind::HookTimeout => "hook-timeout",
            TriggerKind::BuildFailure => "build-failure",
            TriggerKind::TestFailure => "test-failure",
            TriggerKind::ServerCrash => "server-crash",
            TriggerKind::Manual => "manual",
            TriggerKind::SystemFailure => "system-failure",
            TriggerKind::Unknown(s) => s,
        }
    }
}

impl From<String> for TriggerKind {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "process-failure" => TriggerKind::ProcessFailure,
            // "command-timeout" is the descriptive name, "hook-timeout" the table key
            "hook-timeout" | "command-timeout" => TriggerKind::HookTimeout,
            "build-failure" => TriggerKind::BuildFailure,
            "test-failure" => TriggerKind::TestFailure,
            "server-crash" | "process-crash" => TriggerKind::ServerCrash,
            "manual" => TriggerKind::Manual,
            "system-failure" => TriggerKind::SystemFailure,
            _ => TriggerKind::Unknown(s),
        }
    }
}

impl From<TriggerKind> for String {
    fn from(kind: TriggerKind) -> Self {
        kind.as_str().to_string()
    }
}

impl FromStr for TriggerKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TriggerKind::from(s.to_string()))
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Fixed ordering rank: critical=4 > high=3 > medium=2 > low=1
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!(
                "unknown severity '{}' (expected critical, high, medium or low)",
                other
            )),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which check produced a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceSubsystem {
    Dependencies,
    Supervisor,
    TypeCheck,
    Lint,
    DevServer,
    /// The detector itself (probe task crashed)
    Detector,
    /// Supplied by a human
    Operator,
}

impl SourceSubsystem {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceSubsystem::Dependencies => "dependencies",
            SourceSubsystem::Supervisor => "supervisor",
            SourceSubsystem::TypeCheck => "type-check",
            SourceSubsystem::Lint => "lint",
            SourceSubsystem::DevServer => "dev-server",
            SourceSubsystem::Detector => "detector",
            SourceSubsystem::Operator => "operator",
        }
    }
}

impl fmt::Display for SourceSubsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An observed abnormal condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub kind: TriggerKind,
    pub severity: Severity,
    pub observed_at: DateTime<Utc>,
    pub source: SourceSubsystem,
    /// Free-text diagnostic message
    pub message: String,
    #[serde(default)]
    pub affected_subsystems: Vec<String>,
}

impl Trigger {
    pub fn new(
        kind: TriggerKind,
        severity: Severity,
        source: SourceSubsystem,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            observed_at: Utc::now(),
            source,
            message: message.into(),
            affected_subsystems: vec![source.as_str().to_string()],
        }
    }

    /// Trigger raised by an operator rather than a probe
    pub fn operator(kind: TriggerKind, severity: Severity) -> Self {
        let message = format!("{} requested by operator", kind);
        Self {
            kind,
            severity,
            observed_at: Utc::now(),
            source: SourceSubsystem::Operator,
            message,
            affected_subsystems: Vec::new(),
        }
    }

    pub fn with_affected(mut self, subsystem: impl Into<String>) -> Self {
        let subsystem = subsystem.into();
        if !self.affected_subsystems.contains(&subsystem) {
            self.affected_subsystems.push(subsystem);
        }
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Sort triggers most severe first.
///
/// Stable: triggers of equal severity keep their probe-execution order.
pub fn rank_triggers(mut triggers: Vec<Trigger>) -> Vec<Trigger> {
    triggers.sort_by(|a, b| b.severity.rank().cmp(&a.severity.rank()));
    triggers
}
