//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr; stdout carries the JSON results.

use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to `level`.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
