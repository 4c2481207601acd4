//! Logging setup for medicctl
//!
//! Logs go to stderr so `--json` output on stdout stays machine-readable.
//! The filter comes from `$MEDIC_LOG` (same syntax as `RUST_LOG`).

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV_VAR: &str = "MEDIC_LOG";

const DEFAULT_FILTER: &str = "info";

pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
