//! Diagnostic logging setup.
//!
//! Every caught-and-rethrown error and every reconciliation decision in
//! this crate emits `tracing` events; this module wires up a default
//! subscriber for hosts that do not install their own.

use tracing_subscriber::EnvFilter;

/// Environment variable controlling the log filter (standard
/// `tracing_subscriber::EnvFilter` syntax).
pub const LOG_ENV_VAR: &str = "FLOWDECK_LOG";

/// Install a formatted `tracing` subscriber filtered by [`LOG_ENV_VAR`]
/// (default level `info`). Safe to call more than once; a subscriber that
/// is already installed wins.
pub fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
