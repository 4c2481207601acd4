//! Human-readable terminal output

use crate::advisor::{RecoveryAnalysis, RecoveryOutcome, RecoveryReport};
use medic_common::{
    ActionState, DryRunPreview, ProcessStatus, RecoveryStatus, RemediationPlan, Severity,
    StateSnapshot, Trigger,
};
use owo_colors::OwoColorize;
use std::fmt::Write;

fn severity_label(severity: Severity) -> String {
    let label = format!("{:<8}", severity.as_str());
    match severity {
        Severity::Critical => label.bright_red().bold().to_string(),
        Severity::High => label.red().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.dimmed().to_string(),
    }
}

fn seconds(ms: u64) -> String {
    format!("{:.0}s", ms as f64 / 1000.0)
}

pub fn triggers(triggers: &[Trigger]) -> String {
    if triggers.is_empty() {
        return format!("{} all probes passed\n", "[OK]".green());
    }

    let mut out = String::new();
    for trigger in triggers {
        let _ = writeln!(
            out,
            "{} {:<16} {:<13} {}",
            severity_label(trigger.severity),
            trigger.kind.as_str().bold(),
            trigger.source.as_str(),
            trigger.message
        );
    }
    out
}

pub fn snapshot(snapshot: &StateSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "Snapshot".cyan().bold(), snapshot.id);
    let _ = writeln!(out, "  captured    {}", snapshot.captured_at.to_rfc3339());

    let dev = &snapshot.processes.dev_server;
    let dev_status = match (dev.status, dev.pid) {
        (ProcessStatus::Running, Some(pid)) => format!("running (pid {})", pid).green().to_string(),
        (ProcessStatus::Running, None) => "running".green().to_string(),
        (ProcessStatus::Stopped, _) => "stopped".yellow().to_string(),
    };
    let _ = writeln!(out, "  dev server  {}", dev_status);
    let _ = writeln!(out, "  supervisor  {}", yes_no(snapshot.processes.supervisor.present));
    let _ = writeln!(out, "  test run    {}", yes_no(snapshot.processes.test_run.active));

    let workspace = &snapshot.files.workspace;
    if workspace.clean {
        let _ = writeln!(out, "  worktree    {}", "clean".green());
    } else {
        let _ = writeln!(
            out,
            "  worktree    {} ({} uncommitted)",
            "dirty".yellow(),
            workspace.uncommitted.len()
        );
        for path in workspace.uncommitted.iter().take(10) {
            let _ = writeln!(out, "              {}", path.dimmed());
        }
    }

    for (name, value) in &snapshot.environment.variables {
        let _ = writeln!(out, "  env         {}={}", name, value);
    }
    if snapshot.is_degraded() {
        let _ = writeln!(
            out,
            "  {} {}",
            "degraded".bright_red(),
            snapshot.degraded.join(", ")
        );
    }
    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub fn plan(plan: &RemediationPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}, preserve state: {}, up to {})",
        plan.name.bold(),
        plan.strategy,
        plan.preserve_state,
        seconds(plan.estimated_duration_ms())
    );
    for action in &plan.actions {
        let command = action
            .command
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "(operator step)".to_string());
        let _ = writeln!(
            out,
            "  {}. {:<44} {}{}",
            action.sequence,
            action.description,
            command.dimmed(),
            if action.detached { " &" } else { "" }
        );
    }
    let _ = writeln!(out, "  check: {}", plan.recovery_check.health_check);
    out
}

pub fn analysis(analysis: &RecoveryAnalysis) -> String {
    let mut out = String::new();
    let trigger = &analysis.trigger;
    let _ = writeln!(
        out,
        "{} {} {}",
        "Trigger".cyan().bold(),
        severity_label(trigger.severity),
        trigger.kind
    );
    let _ = writeln!(out, "  {}", trigger.message);
    let _ = writeln!(out);
    let _ = write!(out, "{} {}", "Plan".cyan().bold(), plan(&analysis.plan));
    let _ = writeln!(out);

    let risk = &analysis.risk_assessment;
    let _ = writeln!(
        out,
        "{} data loss {:?}, work loss {:?}, stability {:?}",
        "Risk".cyan().bold(),
        risk.data_loss,
        risk.work_loss,
        risk.system_stability
    );
    let _ = writeln!(
        out,
        "{} {}",
        "Estimated recovery time".cyan().bold(),
        seconds(analysis.estimated_recovery_time_ms)
    );
    if !analysis.alternative_plans.is_empty() {
        let names: Vec<&str> = analysis
            .alternative_plans
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        let _ = writeln!(out, "{} {}", "Alternatives".cyan().bold(), names.join(", "));
    }
    out
}

pub fn preview(preview: &DryRunPreview) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} plan {} ({} strategy)",
        "[DRY RUN]".yellow().bold(),
        preview.plan_name.bold(),
        preview.strategy
    );
    for step in &preview.steps {
        let _ = writeln!(
            out,
            "  {}. {} -> {}",
            step.sequence,
            step.description,
            step.command.as_deref().unwrap_or("(operator step)")
        );
        if let Some(validation) = &step.validation {
            let _ = writeln!(out, "       validate: {}", validation);
        }
    }
    let _ = writeln!(out, "  health check: {}", preview.health_check);
    for validation in &preview.rollback_validation {
        let _ = writeln!(out, "  rollback validation: {}", validation);
    }
    let _ = writeln!(out, "  estimated time: {}", seconds(preview.estimated_time_ms));
    out
}

pub fn report(report: &RecoveryReport) -> String {
    let result = &report.result;
    let mut out = String::new();

    for action in &result.actions {
        let marker = match action.state {
            ActionState::Succeeded => "[OK]  ".green().to_string(),
            ActionState::Failed => "[FAIL]".red().to_string(),
            ActionState::Skipped => "[SKIP]".dimmed().to_string(),
        };
        let _ = writeln!(out, "{} {}. {}", marker, action.sequence, action.description);
    }

    let status = match result.recovery_status {
        RecoveryStatus::Complete => "complete".green().bold().to_string(),
        RecoveryStatus::Partial => "partial".yellow().bold().to_string(),
        RecoveryStatus::Failed => "failed".bright_red().bold().to_string(),
    };
    let _ = writeln!(
        out,
        "\nRecovery {} - {} actions completed in {}",
        status,
        result.actions_completed,
        seconds(result.total_elapsed_ms)
    );

    for error in &result.errors {
        let _ = writeln!(out, "  {} {}", "error:".red(), error);
    }
    for change in &report.changes {
        let _ = writeln!(out, "  {} {}", "changed:".cyan(), change);
    }
    if let Some(path) = &report.preserved_snapshot {
        let _ = writeln!(out, "  snapshot saved to {}", path.display());
    }
    out
}

pub fn outcome(outcome: &RecoveryOutcome) -> String {
    match outcome {
        RecoveryOutcome::DryRun(dry_run) => preview(dry_run),
        RecoveryOutcome::ConfirmationRequired { plan, actions, .. } => format!(
            "{} plan {} has {} actions; re-run with --yes to execute or --dry-run to preview\n",
            "Confirmation required:".yellow().bold(),
            plan.bold(),
            actions
        ),
        RecoveryOutcome::Executed(executed) => report(executed),
    }
}
