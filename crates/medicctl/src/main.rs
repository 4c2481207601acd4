//! medicctl - development workflow recovery advisor
//!
//! Exit codes: 0 ok, 1 error, 2 no trigger detected, 3 confirmation
//! required, 4 recovery did not succeed.

use anyhow::{Context, Result};
use clap::Parser;
use medic_common::plan_table::{plan_for_key, plan_keys};
use medic_common::{MedicConfig, RecoveryError};
use medicctl::cli::{Cli, Commands, Selection};
use medicctl::{load_plan_file, logging, render, ExecuteOptions, RecoveryAdvisor, TokioCommandRunner, TracingSink};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

#[tokio::main]
async fn main() {
    logging::init();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            e.downcast_ref::<RecoveryError>()
                .map(RecoveryError::exit_code)
                .unwrap_or(1)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = MedicConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(project) = cli.project {
        config = config.with_project_root(project);
    }
    debug!("Project root: {}", config.project.root.display());

    let advisor = RecoveryAdvisor::new(Arc::new(TokioCommandRunner::new()), config, Arc::new(TracingSink));

    match cli.command {
        Commands::Detect { json } => {
            let triggers = advisor.detect_triggers().await;
            emit(json, &triggers, || render::triggers(&triggers))?;
            Ok(0)
        }
        Commands::Snapshot { json } => {
            let snapshot = advisor.capture_state().await;
            emit(json, &snapshot, || render::snapshot(&snapshot))?;
            Ok(0)
        }
        Commands::Plans { json } => {
            let plans: Vec<_> = plan_keys().into_iter().filter_map(plan_for_key).collect();
            emit(json, &plans, || plans.iter().map(render::plan).collect::<Vec<_>>().join("\n"))?;
            Ok(0)
        }
        Commands::Analyze { selection, json } => {
            let analysis = advisor
                .analyze_recovery(selection.trigger(), &selection.overrides())
                .await?;
            emit(json, &analysis, || render::analysis(&analysis))?;
            Ok(0)
        }
        Commands::Recover {
            selection,
            plan_file,
            dry_run,
            yes,
            json,
        } => {
            let plan = match plan_file {
                Some(path) => load_plan_file(&path)?.with_overrides(&selection.overrides()),
                None => select(&advisor, &selection).await?,
            };

            let outcome = advisor
                .execute_recovery(
                    &plan,
                    ExecuteOptions {
                        dry_run,
                        confirmed: yes,
                    },
                )
                .await?;
            emit(json, &outcome, || render::outcome(&outcome))?;
            Ok(outcome.exit_code())
        }
    }
}

async fn select(
    advisor: &RecoveryAdvisor,
    selection: &Selection,
) -> Result<medic_common::RemediationPlan, RecoveryError> {
    let analysis = advisor
        .analyze_recovery(selection.trigger(), &selection.overrides())
        .await?;
    Ok(analysis.plan)
}

/// Print `value` as JSON or as rendered text
fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to serialize output")?
        );
    } else {
        print!("{}", text());
    }
    Ok(())
}
