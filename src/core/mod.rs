//! Admission control, execution and accounting.

pub mod directory;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod metrics;
pub mod registry;
pub mod reporter;
pub mod resources;
pub mod task;
pub mod worker;

pub use directory::{WorkerDirectory, WorkerId};
pub use error::{AppResult, ReportError, TaskFailure, WorkerError};
pub use executor::{body_fn, run_with_deadline, FnBody, TaskBody, TaskContext, TaskOutcome};
pub use ledger::{ResourceLedger, Shortfall};
pub use metrics::{MetricsSource, TaskTotals, WorkerMetrics};
pub use registry::{TaskHandle, TaskRegistry, TaskStatus};
pub use reporter::{
    DiscardReporter, InMemoryReporter, LogReporter, NodeMetadata, NodeMetadataReporter, Reporter,
};
pub use resources::{ResourceProfile, CPU, MEM_GB, MIN_QUANTITY};
pub use task::{
    generate_task_id, MetricValue, TaskId, TaskMetrics, TaskRequest, TaskResult, DURATION_METRIC,
    ERROR_METRIC,
};
pub use worker::{Admission, Worker};
