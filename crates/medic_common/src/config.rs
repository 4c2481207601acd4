//! Configuration management for medic.
//!
//! Loads settings from a TOML file or uses defaults. Lookup order:
//! explicit path, `$MEDIC_CONFIG`, `./medic.toml`, `<config dir>/medic/config.toml`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Project-local config file name
pub const LOCAL_CONFIG_FILE: &str = "medic.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MEDIC_CONFIG";

/// Host project settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Working directory for every spawned command
    #[serde(default = "default_project_root")]
    pub root: PathBuf,

    #[serde(default = "default_dev_server_host")]
    pub dev_server_host: String,

    #[serde(default = "default_dev_server_port")]
    pub dev_server_port: u16,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_dev_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_dev_server_port() -> u16 {
    3000
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_project_root(),
            dev_server_host: default_dev_server_host(),
            dev_server_port: default_dev_server_port(),
        }
    }
}

/// Health probe settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Per-probe timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,

    /// Type check gets longer on large projects
    #[serde(default = "default_type_check_timeout")]
    pub type_check_timeout_secs: u64,

    /// Argv of the supervisor health command
    #[serde(default = "default_supervisor_command")]
    pub supervisor_command: Vec<String>,

    /// Skip the lint probe entirely
    #[serde(default)]
    pub skip_lint: bool,

    /// Skip the dev server port probe (projects that run no dev server)
    #[serde(default)]
    pub skip_dev_server: bool,
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_type_check_timeout() -> u64 {
    90
}

fn default_supervisor_command() -> Vec<String> {
    vec![
        "npm".to_string(),
        "run".to_string(),
        "--silent".to_string(),
        "supervisor:health".to_string(),
    ]
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout(),
            type_check_timeout_secs: default_type_check_timeout(),
            supervisor_command: default_supervisor_command(),
            skip_lint: false,
            skip_dev_server: false,
        }
    }
}

/// State snapshot settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Environment variables recorded in every snapshot
    #[serde(default = "default_environment_variables")]
    pub environment_variables: Vec<String>,

    /// Substring identifying the dev server in the process table
    #[serde(default = "default_dev_server_pattern")]
    pub dev_server_pattern: String,

    #[serde(default = "default_supervisor_pattern")]
    pub supervisor_pattern: String,

    #[serde(default = "default_test_runner_pattern")]
    pub test_runner_pattern: String,

    /// Where preserved snapshots are written; unset disables persistence
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    #[serde(default = "default_snapshot_timeout")]
    pub command_timeout_secs: u64,
}

fn default_environment_variables() -> Vec<String> {
    ["NODE_ENV", "PORT", "CI", "NEXT_TELEMETRY_DISABLED", "NODE_OPTIONS"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_dev_server_pattern() -> String {
    "next dev".to_string()
}

fn default_supervisor_pattern() -> String {
    "supervisor".to_string()
}

fn default_test_runner_pattern() -> String {
    "jest".to_string()
}

fn default_snapshot_timeout() -> u64 {
    10
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            environment_variables: default_environment_variables(),
            dev_server_pattern: default_dev_server_pattern(),
            supervisor_pattern: default_supervisor_pattern(),
            test_runner_pattern: default_test_runner_pattern(),
            state_dir: None,
            command_timeout_secs: default_snapshot_timeout(),
        }
    }
}

/// Plan execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Timeout for per-action validation commands
    #[serde(default = "default_validation_timeout")]
    pub validation_timeout_secs: u64,

    /// Timeout for each recovery check command
    #[serde(default = "default_recovery_check_timeout")]
    pub recovery_check_timeout_secs: u64,

    /// Buffer added to the worst-case recovery estimate
    #[serde(default = "default_estimate_buffer")]
    pub estimate_buffer_ms: u64,
}

fn default_validation_timeout() -> u64 {
    5
}

fn default_recovery_check_timeout() -> u64 {
    120
}

fn default_estimate_buffer() -> u64 {
    30_000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            validation_timeout_secs: default_validation_timeout(),
            recovery_check_timeout_secs: default_recovery_check_timeout(),
            estimate_buffer_ms: default_estimate_buffer(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub probes: ProbeConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl MedicConfig {
    /// Load from an explicit path, `$MEDIC_CONFIG`, or the default lookup chain.
    ///
    /// An explicit or environment path that does not exist is an error; a
    /// missing default file just means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self::load_from(explicit, env_path.as_deref())
    }

    fn load_from(explicit: Option<&Path>, env_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit.or(env_path) {
            return Self::from_file(path);
        }

        for candidate in Self::candidate_paths() {
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("medic").join("config.toml"));
        }
        paths
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probes.timeout_secs == 0 || self.probes.type_check_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "probe timeouts must be greater than zero".to_string(),
            ));
        }
        if self.execution.validation_timeout_secs == 0
            || self.execution.recovery_check_timeout_secs == 0
        {
            return Err(ConfigError::Invalid(
                "execution timeouts must be greater than zero".to_string(),
            ));
        }
        if self.snapshot.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "snapshot command timeout must be greater than zero".to_string(),
            ));
        }
        if self.snapshot.dev_server_pattern.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "snapshot.dev_server_pattern must not be empty".to_string(),
            ));
        }
        if self.probes.supervisor_command.is_empty() {
            return Err(ConfigError::Invalid(
                "probes.supervisor_command must name a program".to_string(),
            ));
        }
        Ok(())
    }

    /// Override the project root (CLI `--project`)
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project.root = root.into();
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probes.timeout_secs)
    }

    pub fn type_check_timeout(&self) -> Duration {
        Duration::from_secs(self.probes.type_check_timeout_secs)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.execution.validation_timeout_secs)
    }

    pub fn recovery_check_timeout(&self) -> Duration {
        Duration::from_secs(self.execution.recovery_check_timeout_secs)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot.command_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MedicConfig::default();
        assert_eq!(config.project.dev_server_port, 3000);
        assert_eq!(config.execution.validation_timeout_secs, 5);
        assert_eq!(config.execution.estimate_buffer_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = MedicConfig::parse(
            r#"
            [project]
            dev_server_port = 4000

            [snapshot]
            environment_variables = ["NODE_ENV"]
            "#,
        )
        .unwrap();

        assert_eq!(config.project.dev_server_port, 4000);
        assert_eq!(config.project.dev_server_host, "127.0.0.1");
        assert_eq!(config.snapshot.environment_variables, vec!["NODE_ENV"]);
        assert_eq!(config.snapshot.dev_server_pattern, "next dev");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = MedicConfig::parse("[probes]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_env_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");

        let err = MedicConfig::load_from(None, Some(&missing)).unwrap_err();
        match err {
            ConfigError::Read { path, .. } => assert_eq!(path, missing),
            other => panic!("expected read error, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_path_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        fs::write(&explicit, "[project]\ndev_server_port = 4100\n").unwrap();
        let missing = dir.path().join("absent.toml");

        let config = MedicConfig::load_from(Some(&explicit), Some(&missing)).unwrap();
        assert_eq!(config.project.dev_server_port, 4100);
    }

    #[test]
    fn test_bad_toml_rejected() {
        let err = MedicConfig::parse("[project\nroot = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
