//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Reads the filter from `RUST_LOG`, falling back to `info`. Safe to call
/// multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default_filter("info");
}

/// Initialize with an explicit fallback filter, used when `RUST_LOG` is
/// unset. Useful for tests that want `debug` output without touching the
/// environment.
pub fn init_with_default_filter(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // JSON logs + timestamps, configurable via RUST_LOG.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
