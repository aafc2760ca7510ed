//! Tracing initialization for host binaries and tests.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber with an env-filter, defaulting
/// to `info` when `RUST_LOG` is unset. Call once, as early as possible;
/// repeated calls are ignored.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .ok();
}
