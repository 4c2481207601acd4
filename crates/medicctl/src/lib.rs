//! medicctl - recovery advisor runtime
//!
//! Everything that touches the outside world: spawning commands, probing
//! the project, capturing state and running remediation plans. The pure
//! data model lives in `medic_common`.

pub mod advisor;
pub mod cli;
pub mod detector;
pub mod executor;
pub mod logging;
pub mod render;
pub mod runner;
pub mod sink;
pub mod snapshotter;

pub use advisor::{load_plan_file, ExecuteOptions, RecoveryAdvisor, RecoveryAnalysis, RecoveryOutcome, RecoveryReport};
pub use detector::{ProbeCheck, ProbeSpec, TriggerDetector};
pub use executor::PlanExecutor;
pub use runner::{
    CommandInvocation, CommandOutput, CommandRunner, CommandStatus, FakeCommandRunner,
    FakeResponse, TokioCommandRunner,
};
pub use sink::TracingSink;
pub use snapshotter::{EnvSource, ProcessEnv, StateSnapshotter, StaticEnv};
