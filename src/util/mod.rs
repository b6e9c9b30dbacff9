//! Clock and logging helpers.

pub mod clock;
pub mod telemetry;

pub use clock::now_ms;
pub use telemetry::{init_tracing, init_tracing_with, DEFAULT_LOG_FILTER};
