//! Tracing subscriber setup for binaries and notebooks embedding the
//! resolver.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging.
///
/// Respects `RUST_LOG` for filtering and defaults to `info`. Call once
/// at process start; a second call panics inside `tracing_subscriber`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Initialize with an explicit filter string, ignoring the environment.
/// Useful in tests and embedded contexts.
pub fn init_tracing_with_filter(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(true)
        .init();
}
