//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for
//! command output so one-shot invocations stay pipeable.

use tracing_subscriber::EnvFilter;

/// Environment variable that takes precedence over `--log-level`.
pub const LOG_ENV_VAR: &str = "MSF_BRIDGE_LOG";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Picks the filter directive: environment first, then the flag, then the
/// default.
pub fn resolve_filter(env_value: Option<String>, flag: Option<&str>) -> String {
    env_value
        .filter(|value| !value.trim().is_empty())
        .or_else(|| flag.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Installs the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_tracing(flag: Option<&str>) {
    let directive = resolve_filter(std::env::var(LOG_ENV_VAR).ok(), flag);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
