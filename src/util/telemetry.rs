//! Structured logging setup for worker processes.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the binary. These helpers cover the common case.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: worker lifecycle and task outcomes.
pub const DEFAULT_LOG_FILTER: &str = "prometheus_task_worker=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_LOG_FILTER`]. Does nothing if a global subscriber exists.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    install(filter);
}

/// Install a fmt subscriber with an explicit filter directive, e.g.
/// `"prometheus_task_worker=debug"`. Does nothing if a global subscriber
/// exists.
pub fn init_tracing_with(directive: &str) {
    install(EnvFilter::new(directive));
}

fn install(filter: EnvFilter) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
