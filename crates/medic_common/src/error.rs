//! Error types for Medic.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors surfaced by the recovery advisor.
///
/// Probe, snapshot and action failures are never errors; they are reported
/// inside results.
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("No trigger detected: every health probe passed")]
    NoTriggerDetected,

    #[error("Invalid remediation plan: {0}")]
    InvalidPlan(String),

    #[error("Failed to load plan file {path}: {reason}")]
    PlanFile { path: PathBuf, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RecoveryError {
    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            RecoveryError::NoTriggerDetected => 2,
            RecoveryError::InvalidPlan(_) => 1,
            RecoveryError::PlanFile { .. } => 1,
            RecoveryError::Config(_) => 1,
        }
    }
}
