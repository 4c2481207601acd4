//! State snapshot - best-effort capture of process, workspace and environment state.
//!
//! Used for before/after risk comparison and for the final report. Never
//! mutated once captured.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Liveness of the dev server process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    /// Also the value used when the process table could not be read
    #[default]
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevServerState {
    pub status: ProcessStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorState {
    pub present: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunState {
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    pub dev_server: DevServerState,
    pub supervisor: SupervisorState,
    pub test_run: TestRunState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceState {
    /// False both for a dirty tree and for an unreadable one
    pub clean: bool,
    /// Paths reported by version control as uncommitted (sorted)
    #[serde(default)]
    pub uncommitted: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub workspace: WorkspaceState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub variables: BTreeMap<String, String>,
}

/// Point-in-time capture of observable state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub id: String,
    pub captured_at: DateTime<Utc>,
    pub processes: ProcessSnapshot,
    pub files: FileSnapshot,
    pub environment: EnvironmentSnapshot,
    /// Sub-captures that failed and fell back to their unknown default
    #[serde(default)]
    pub degraded: Vec<String>,
}

impl StateSnapshot {
    /// The all-unknown snapshot: dev server stopped, tree not clean, no variables
    pub fn minimal() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            captured_at: Utc::now(),
            processes: ProcessSnapshot::default(),
            files: FileSnapshot::default(),
            environment: EnvironmentSnapshot::default(),
            degraded: Vec::new(),
        }
    }

    pub fn is_workspace_clean(&self) -> bool {
        self.files.workspace.clean
    }

    pub fn dev_server_running(&self) -> bool {
        self.processes.dev_server.status == ProcessStatus::Running
    }

    pub fn mark_degraded(&mut self, field: &str) {
        if !self.degraded.iter().any(|f| f == field) {
            self.degraded.push(field.to_string());
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Human-readable differences between two snapshots
pub fn compare_snapshots(before: &StateSnapshot, after: &StateSnapshot) -> Vec<String> {
    let mut changes = Vec::new();

    let (was, now) = (&before.processes.dev_server, &after.processes.dev_server);
    if was.status != now.status {
        changes.push(format!("dev server {:?} -> {:?}", was.status, now.status).to_lowercase());
    } else if was.pid != now.pid && now.status == ProcessStatus::Running {
        changes.push("dev server restarted with a new pid".to_string());
    }

    if before.processes.supervisor.present != after.processes.supervisor.present {
        changes.push(format!(
            "supervisor {}",
            if after.processes.supervisor.present { "appeared" } else { "disappeared" }
        ));
    }

    let (was, now) = (&before.files.workspace, &after.files.workspace);
    if was.clean != now.clean {
        changes.push(format!(
            "working tree became {}",
            if now.clean { "clean" } else { "dirty" }
        ));
    }
    for path in now.uncommitted.iter().filter(|p| !was.uncommitted.contains(p)) {
        changes.push(format!("new uncommitted path: {}", path));
    }

    for (name, value) in &after.environment.variables {
        match before.environment.variables.get(name) {
            Some(previous) if previous == value => {}
            Some(_) => changes.push(format!("{} changed", name)),
            None => changes.push(format!("{} set", name)),
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_defaults() {
        let snap = StateSnapshot::minimal();
        assert_eq!(snap.processes.dev_server.status, ProcessStatus::Stopped);
        assert!(!snap.files.workspace.clean);
        assert!(snap.environment.variables.is_empty());
        assert!(!snap.is_degraded());
    }

    #[test]
    fn test_json_field_names() {
        let snap = StateSnapshot::minimal();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["processes"]["devServer"]["status"], "stopped");
        assert_eq!(json["files"]["workspace"]["clean"], false);
        assert!(json["environment"]["variables"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_compare_identical() {
        let snap = StateSnapshot::minimal();
        assert!(compare_snapshots(&snap, &snap.clone()).is_empty());
    }

    #[test]
    fn test_compare_detects_restart_and_new_paths() {
        let before = StateSnapshot::minimal();
        let mut after = before.clone();
        after.processes.dev_server = DevServerState {
            status: ProcessStatus::Running,
            pid: Some(4242),
        };
        after.files.workspace.uncommitted = vec!["package-lock.json".to_string()];

        let changes = compare_snapshots(&before, &after);
        assert!(changes.contains(&"dev server stopped -> running".to_string()));
        assert!(changes.contains(&"new uncommitted path: package-lock.json".to_string()));
    }

    #[test]
    fn test_mark_degraded_dedups() {
        let mut snap = StateSnapshot::minimal();
        snap.mark_degraded("processes");
        snap.mark_degraded("processes");
        assert_eq!(snap.degraded, vec!["processes".to_string()]);
    }
}
