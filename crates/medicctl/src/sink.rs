//! Event sink that forwards recovery events to `tracing`

use medic_common::{ActionState, EventSink, RecoveryEvent};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: RecoveryEvent) {
        match event {
            RecoveryEvent::DetectionStarted { probes } => {
                debug!(probes, "detection started");
            }
            RecoveryEvent::ProbePassed { probe, duration_ms } => {
                debug!(%probe, duration_ms, "probe passed");
            }
            RecoveryEvent::ProbeFailed {
                probe,
                source,
                kind,
                severity,
                message,
            } => {
                warn!(%probe, %source, %kind, %severity, "{}", message);
            }
            RecoveryEvent::DetectionFinished { triggers } => {
                info!(triggers, "detection finished");
            }
            RecoveryEvent::PlanSelected {
                plan,
                trigger,
                strategy,
                overridden,
            } => {
                info!(%plan, %trigger, %strategy, overridden, "plan selected");
            }
            RecoveryEvent::SnapshotDegraded { field, reason } => {
                warn!(%field, "snapshot degraded: {}", reason);
            }
            RecoveryEvent::SnapshotPersistFailed { reason } => {
                warn!("snapshot not preserved: {}", reason);
            }
            RecoveryEvent::ActionStarted {
                sequence,
                description,
                command,
            } => {
                info!(
                    sequence,
                    command = command.as_deref().unwrap_or("-"),
                    "{}",
                    description
                );
            }
            RecoveryEvent::ActionFinished {
                sequence,
                state,
                duration_ms,
                error,
            } => match (state, error) {
                (ActionState::Failed, Some(error)) => warn!(sequence, duration_ms, "{}", error),
                _ => debug!(sequence, duration_ms, ?state, "action finished"),
            },
            RecoveryEvent::ValidationFailed { sequence, error } => {
                warn!(sequence, "{}", error);
            }
            RecoveryEvent::ActionSkipped {
                sequence,
                description,
            } => {
                info!(sequence, "skipped: {}", description);
            }
            RecoveryEvent::RecoveryCheckFinished { passed, failures } => {
                if passed {
                    info!("recovery check passed");
                } else {
                    warn!(failures = failures.len(), "recovery check failed");
                }
            }
            RecoveryEvent::ExecutionFinished {
                status,
                succeeded,
                elapsed_ms,
            } => {
                info!(status = status.as_str(), succeeded, elapsed_ms, "execution finished");
            }
            RecoveryEvent::ConfirmationRequired { plan } => {
                info!(%plan, "confirmation required before executing");
            }
        }
    }
}
