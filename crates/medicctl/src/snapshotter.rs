//! State snapshotter - best-effort capture of processes, working tree and environment
//!
//! Three independent sub-captures. A failing one degrades only its own field
//! to the unknown default and is recorded in `StateSnapshot::degraded`.

use crate::runner::{CommandInvocation, CommandRunner};
use medic_common::config::SnapshotConfig;
use medic_common::snapshot::{
    DevServerState, EnvironmentSnapshot, FileSnapshot, ProcessSnapshot, SupervisorState,
    TestRunState, WorkspaceState,
};
use medic_common::{CommandSpec, EventSink, MedicConfig, ProcessStatus, RecoveryEvent, StateSnapshot};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of environment variables
pub trait EnvSource: Send + Sync {
    /// `Ok(None)` when unset, `Err` when the value cannot be read
    fn get(&self, name: &str) -> Result<Option<String>, String>;
}

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Result<Option<String>, String> {
        match std::env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(format!("{}: {}", name, e)),
        }
    }
}

/// Fixed variable map, for tests and replay
#[derive(Debug, Default, Clone)]
pub struct StaticEnv {
    variables: BTreeMap<String, String>,
}

impl StaticEnv {
    pub fn new<I, K, V>(variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            variables: variables
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvSource for StaticEnv {
    fn get(&self, name: &str) -> Result<Option<String>, String> {
        Ok(self.variables.get(name).cloned())
    }
}

pub struct StateSnapshotter {
    runner: Arc<dyn CommandRunner>,
    env: Arc<dyn EnvSource>,
    config: SnapshotConfig,
    project_root: PathBuf,
    timeout: Duration,
    sink: Arc<dyn EventSink>,
}

impl StateSnapshotter {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &MedicConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            runner,
            env: Arc::new(ProcessEnv),
            config: config.snapshot.clone(),
            project_root: config.project.root.clone(),
            timeout: config.snapshot_timeout(),
            sink,
        }
    }

    pub fn with_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    /// Capture a snapshot. Never fails.
    pub async fn capture_state(&self) -> StateSnapshot {
        let mut snapshot = StateSnapshot::minimal();

        match self.capture_processes().await {
            Ok(processes) => snapshot.processes = processes,
            Err(reason) => self.degrade(&mut snapshot, "processes", reason),
        }

        match self.capture_files().await {
            Ok(files) => snapshot.files = files,
            Err(reason) => self.degrade(&mut snapshot, "files", reason),
        }

        match self.capture_environment() {
            Ok(environment) => snapshot.environment = environment,
            Err(reason) => self.degrade(&mut snapshot, "environment", reason),
        }

        debug!(
            "Captured snapshot {} (degraded: {:?})",
            snapshot.id, snapshot.degraded
        );
        snapshot
    }

    /// Write the snapshot to the configured state directory.
    ///
    /// Returns the written path, or `None` when persistence is disabled or
    /// failed (failure is reported as an event, not an error).
    pub async fn preserve(&self, snapshot: &StateSnapshot) -> Option<PathBuf> {
        let dir = self.config.state_dir.as_ref()?;
        let path = dir.join(format!("snapshot-{}.json", snapshot.id));

        let result = async {
            tokio::fs::create_dir_all(dir).await.map_err(|e| e.to_string())?;
            let json = serde_json::to_string_pretty(snapshot).map_err(|e| e.to_string())?;
            tokio::fs::write(&path, json).await.map_err(|e| e.to_string())
        }
        .await;

        match result {
            Ok(()) => {
                info!("Preserved snapshot at {}", path.display());
                Some(path)
            }
            Err(reason) => {
                warn!("Failed to preserve snapshot {}: {}", snapshot.id, reason);
                self.sink.emit(RecoveryEvent::SnapshotPersistFailed { reason });
                None
            }
        }
    }

    fn degrade(&self, snapshot: &mut StateSnapshot, field: &str, reason: String) {
        warn!("Snapshot {} capture failed: {}", field, reason);
        snapshot.mark_degraded(field);
        self.sink.emit(RecoveryEvent::SnapshotDegraded {
            field: field.to_string(),
            reason,
        });
    }

    async fn run_capture(&self, argv: &[&str]) -> Result<String, String> {
        let spec = CommandSpec::from_argv(argv).ok_or_else(|| "empty command".to_string())?;
        let invocation = CommandInvocation::new(&spec, self.timeout).in_dir(&self.project_root);
        let output = self.runner.run(&invocation).await;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(format!("{}: {}", spec, output.failure_summary()))
        }
    }

    async fn capture_processes(&self) -> Result<ProcessSnapshot, String> {
        let table = self.run_capture(&["ps", "-eo", "pid=,args="]).await?;
        Ok(parse_process_table(&table, &self.config))
    }

    async fn capture_files(&self) -> Result<FileSnapshot, String> {
        let porcelain = self.run_capture(&["git", "status", "--porcelain"]).await?;
        let uncommitted = parse_porcelain(&porcelain);
        Ok(FileSnapshot {
            workspace: WorkspaceState {
                clean: uncommitted.is_empty(),
                uncommitted,
            },
        })
    }

    fn capture_environment(&self) -> Result<EnvironmentSnapshot, String> {
        let mut variables = BTreeMap::new();
        for name in &self.config.environment_variables {
            if let Some(value) = self.env.get(name)? {
                variables.insert(name.clone(), value);
            }
        }
        Ok(EnvironmentSnapshot { variables })
    }
}

/// Parse `ps -eo pid=,args=` output against the configured patterns
fn parse_process_table(table: &str, config: &SnapshotConfig) -> ProcessSnapshot {
    let mut snapshot = ProcessSnapshot::default();

    for line in table.lines() {
        let line = line.trim();
        let Some((pid, args)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let Ok(pid) = pid.parse::<u32>() else {
            continue;
        };

        if snapshot.dev_server.pid.is_none() && args.contains(&config.dev_server_pattern) {
            snapshot.dev_server = DevServerState {
                status: ProcessStatus::Running,
                pid: Some(pid),
            };
        }
        if !config.supervisor_pattern.is_empty() && args.contains(&config.supervisor_pattern) {
            snapshot.supervisor = SupervisorState { present: true };
        }
        if !config.test_runner_pattern.is_empty() && args.contains(&config.test_runner_pattern) {
            snapshot.test_run = TestRunState { active: true };
        }
    }

    snapshot
}

/// Paths from `git status --porcelain`, sorted and deduplicated.
///
/// Renames (`R  old -> new`) report the new path.
fn parse_porcelain(output: &str) -> Vec<String> {
    let mut paths: Vec<String> = output
        .lines()
        .filter_map(|line| line.get(3..))
        .filter(|path| !path.is_empty())
        .map(|path| match path.split_once(" -> ") {
            Some((_, to)) => to.to_string(),
            None => path.to_string(),
        })
        .collect();
    paths.sort();
    paths.dedup();
    paths
}
