//! Worker configuration: limits, timeouts and reporter selection.

pub mod worker;

pub use worker::{BaseReporterConfig, NodeMetadataConfig, ReporterConfig, WorkerConfig};
