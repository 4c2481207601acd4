//! Structured recovery events.
//!
//! Every stage reports what it did through an injected `EventSink` instead
//! of printing, so the advisor stays observable in tests.

use crate::execution::{ActionState, RecoveryStatus};
use crate::plan::StrategyName;
use crate::trigger::{Severity, SourceSubsystem, TriggerKind};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecoveryEvent {
    DetectionStarted {
        probes: usize,
    },
    ProbePassed {
        probe: String,
        duration_ms: u64,
    },
    ProbeFailed {
        probe: String,
        source: SourceSubsystem,
        kind: TriggerKind,
        severity: Severity,
        message: String,
    },
    DetectionFinished {
        triggers: usize,
    },
    PlanSelected {
        plan: String,
        trigger: TriggerKind,
        strategy: StrategyName,
        overridden: bool,
    },
    SnapshotDegraded {
        field: String,
        reason: String,
    },
    SnapshotPersistFailed {
        reason: String,
    },
    ActionStarted {
        sequence: u32,
        description: String,
        command: Option<String>,
    },
    ActionFinished {
        sequence: u32,
        state: ActionState,
        duration_ms: u64,
        error: Option<String>,
    },
    ValidationFailed {
        sequence: u32,
        error: String,
    },
    ActionSkipped {
        sequence: u32,
        description: String,
    },
    RecoveryCheckFinished {
        passed: bool,
        failures: Vec<String>,
    },
    ExecutionFinished {
        status: RecoveryStatus,
        succeeded: bool,
        elapsed_ms: u64,
    },
    ConfirmationRequired {
        plan: String,
    },
}

/// Receiver of structured recovery events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RecoveryEvent);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: RecoveryEvent) {}
}

/// Sink that keeps every event in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<RecoveryEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecoveryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&RecoveryEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: RecoveryEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.emit(RecoveryEvent::DetectionStarted { probes: 5 });
        sink.emit(RecoveryEvent::DetectionFinished { triggers: 0 });

        assert_eq!(sink.len(), 2);
        assert_eq!(
            sink.count(|e| matches!(e, RecoveryEvent::DetectionFinished { .. })),
            1
        );
    }

    #[test]
    fn test_clones_share_storage() {
        let sink = MemorySink::new();
        let clone = sink.clone();
        clone.emit(RecoveryEvent::ConfirmationRequired {
            plan: "build-failure".to_string(),
        });
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(RecoveryEvent::DetectionStarted { probes: 3 }).unwrap();
        assert_eq!(json["event"], "detection_started");
        assert_eq!(json["probes"], 3);
    }
}
