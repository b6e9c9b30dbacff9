//! Error types for admission, execution and reporting.

use std::time::Duration;

use thiserror::Error;

use super::TaskId;

/// Errors surfaced synchronously by the worker: admission rejections and
/// construction failures. No variant is produced after a task was admitted.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Admitting the task would push a resource kind over its limit.
    #[error("insufficient_resources: {kind} requested {requested}, available {available}")]
    InsufficientResources {
        /// Resource kind that could not be satisfied.
        kind: String,
        /// Amount the task asked for.
        requested: f64,
        /// Amount left under the limit at decision time.
        available: f64,
    },
    /// A task with the same identifier is already admitted or waiting.
    #[error("duplicate task id: {0}")]
    DuplicateTask(TaskId),
    /// Task deadline had already passed when it was submitted.
    #[error("deadline expired")]
    DeadlineExpired,
    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The worker is draining and accepts no more work.
    #[error("worker is shutting down")]
    ShuttingDown,
    /// Configuration validation failed; the worker cannot start.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl WorkerError {
    /// Stable machine-readable code used in admission responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InsufficientResources { .. } => "insufficient_resources",
            Self::DuplicateTask(_) => "duplicate_task",
            Self::DeadlineExpired => "deadline_expired",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ShuttingDown => "shutting_down",
            Self::InvalidConfig(_) => "invalid_configuration",
        }
    }

    /// Whether this error is an admission rejection (as opposed to a fatal
    /// construction error).
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_))
    }
}

/// Why an admitted task did not succeed. The `Display` output becomes the
/// `error` metric of the reported result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskFailure {
    /// The body did not finish within the per-task timeout.
    #[error("timeout after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    /// The execution was cancelled, usually by worker shutdown.
    #[error("cancelled")]
    Cancelled,
    /// The body returned an error or panicked.
    #[error("{0}")]
    Execution(String),
}

/// Errors a reporter may return. These are logged and never retried.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Network-class failure delivering the result.
    #[error("network error: {0}")]
    Network(String),
    /// The receiving side refused the result.
    #[error("result rejected: {0}")]
    Rejected(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
