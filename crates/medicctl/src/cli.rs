//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap. Keeps argument parsing separate
//! from execution logic.

use clap::{Args, Parser, Subcommand};
use medic_common::{PlanOverrides, Severity, StrategyName, Trigger, TriggerKind};
use std::path::PathBuf;

/// Development workflow recovery advisor
#[derive(Parser, Debug)]
#[command(name = "medicctl")]
#[command(about = "Detect broken development workflows and run remediation plans", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Config file (overrides $MEDIC_CONFIG and the default lookup)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Project root every command runs in
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the health probes and list triggers, most severe first
    Detect {
        #[arg(long)]
        json: bool,
    },

    /// Capture and print the current state snapshot
    Snapshot {
        #[arg(long)]
        json: bool,
    },

    /// List the remediation plan table
    Plans {
        #[arg(long)]
        json: bool,
    },

    /// Select a plan and assess risk without running anything
    Analyze {
        #[command(flatten)]
        selection: Selection,

        #[arg(long)]
        json: bool,
    },

    /// Execute a remediation plan
    Recover {
        #[command(flatten)]
        selection: Selection,

        /// Execute a plan loaded from a JSON file instead of the table
        #[arg(long, value_name = "FILE")]
        plan_file: Option<PathBuf>,

        /// Only show what would run
        #[arg(long)]
        dry_run: bool,

        /// Execute without asking
        #[arg(long, short = 'y')]
        yes: bool,

        #[arg(long)]
        json: bool,
    },
}

/// Trigger and plan selectors shared by `analyze` and `recover`
#[derive(Args, Debug, Clone, Default)]
pub struct Selection {
    /// Trigger kind (skips detection), e.g. build-failure
    #[arg(long, value_name = "KIND")]
    pub trigger: Option<TriggerKind>,

    /// Severity of a --trigger (default: medium)
    #[arg(long, value_name = "SEVERITY", requires = "trigger")]
    pub severity: Option<Severity>,

    /// Override the plan strategy
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<StrategyName>,

    /// Override whether state is preserved before executing
    #[arg(long, value_name = "BOOL")]
    pub preserve_state: Option<bool>,
}

impl Selection {
    /// Operator trigger from `--trigger`, if given
    pub fn trigger(&self) -> Option<Trigger> {
        self.trigger.clone().map(|kind| {
            Trigger::operator(kind, self.severity.unwrap_or(Severity::Medium))
        })
    }

    pub fn overrides(&self) -> PlanOverrides {
        PlanOverrides {
            strategy: self.strategy,
            preserve_state: self.preserve_state,
        }
    }
}
