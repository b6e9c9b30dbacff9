//! Task request and result models.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ResourceProfile, TaskFailure, CPU, MEM_GB};

/// Unique task identifier.
pub type TaskId = String;

/// Metric key carrying the failure description.
pub const ERROR_METRIC: &str = "error";
/// Metric key carrying the execution wall time in seconds.
pub const DURATION_METRIC: &str = "duration";

/// Generate a task identifier of the form `task_<8 hex digits>`.
#[must_use]
pub fn generate_task_id() -> TaskId {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("task_{}", &hex[..8])
}

fn default_priority() -> i32 {
    1
}

fn default_required_resources() -> ResourceProfile {
    ResourceProfile::from([(CPU, 0.5), (MEM_GB, 1.0)])
}

/// A request to execute one unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "P: serde::Serialize"))]
#[serde(bound(deserialize = "P: serde::de::DeserializeOwned"))]
pub struct TaskRequest<P = serde_json::Value> {
    /// Unique identifier; generated when absent.
    #[serde(default = "generate_task_id")]
    pub task_id: TaskId,
    /// Opaque unit of work handed to the task body.
    pub payload: P,
    /// Ordering hint, advisory only.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Absolute deadline in milliseconds since epoch.
    #[serde(default)]
    pub deadline_ms: Option<u128>,
    /// Resources held for the whole execution.
    #[serde(default = "default_required_resources")]
    pub required_resources: ResourceProfile,
}

impl<P> TaskRequest<P> {
    /// Create a request with a generated id and the default priority and
    /// resource requirement.
    pub fn new(payload: P) -> Self {
        Self {
            task_id: generate_task_id(),
            payload,
            priority: default_priority(),
            deadline_ms: None,
            required_resources: default_required_resources(),
        }
    }

    /// Set the task identifier.
    #[must_use]
    pub fn with_id(mut self, task_id: impl Into<TaskId>) -> Self {
        self.task_id = task_id.into();
        self
    }

    /// Set the priority hint.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set an absolute deadline (ms since epoch).
    #[must_use]
    pub const fn with_deadline_ms(mut self, deadline_ms: u128) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Set the required resources.
    #[must_use]
    pub fn with_resources(mut self, required: ResourceProfile) -> Self {
        self.required_resources = required;
        self
    }

    /// Structural checks performed before admission.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the id is empty or a
    /// required quantity is negative or not finite.
    pub fn validate(&self) -> Result<(), String> {
        if self.task_id.trim().is_empty() {
            return Err("task_id must not be empty".into());
        }
        self.required_resources.validate_requirement()
    }
}

/// A single metric value: numeric for measurements, text for descriptions
/// such as the `error` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Numeric measurement.
    Number(f64),
    /// Free-form text.
    Text(String),
}

impl MetricValue {
    /// Numeric value, if this is a number.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// Text value, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for MetricValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Named metrics produced by a task.
pub type TaskMetrics = BTreeMap<String, MetricValue>;

/// Outcome of one task attempt. Built once by the executor and never mutated;
/// reporters that enrich it produce a new value via [`TaskResult::with_artifact`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    task_id: TaskId,
    success: bool,
    metrics: TaskMetrics,
    #[serde(default)]
    artifacts: Vec<String>,
}

impl TaskResult {
    /// Successful result carrying the body's metrics.
    #[must_use]
    pub fn success(task_id: impl Into<TaskId>, metrics: TaskMetrics) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            metrics,
            artifacts: Vec::new(),
        }
    }

    /// Failed result; the failure description is stored as the `error` metric.
    #[must_use]
    pub fn failure(task_id: impl Into<TaskId>, failure: &TaskFailure) -> Self {
        let mut metrics = TaskMetrics::new();
        metrics.insert(ERROR_METRIC.into(), MetricValue::Text(failure.to_string()));
        Self {
            task_id: task_id.into(),
            success: false,
            metrics,
            artifacts: Vec::new(),
        }
    }

    /// Copy of this result with one more metric.
    #[must_use]
    pub fn with_metric(mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }

    /// Copy of this result with an artifact location appended.
    #[must_use]
    pub fn with_artifact(mut self, location: impl Into<String>) -> Self {
        self.artifacts.push(location.into());
        self
    }

    /// Task identifier.
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Whether the task succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// All metrics.
    #[must_use]
    pub const fn metrics(&self) -> &TaskMetrics {
        &self.metrics
    }

    /// Single metric by name.
    #[must_use]
    pub fn metric(&self, key: &str) -> Option<&MetricValue> {
        self.metrics.get(key)
    }

    /// The `error` metric text, present on failures.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.metric(ERROR_METRIC).and_then(MetricValue::as_text)
    }

    /// Artifact locations in insertion order.
    #[must_use]
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_generated_id_shape() {
        let id = generate_task_id();
        assert!(id.starts_with("task_"));
        assert_eq!(id.len(), "task_".len() + 8);
        assert_ne!(id, generate_task_id());
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: TaskRequest = serde_json::from_str(r#"{"payload": {"op": "train"}}"#).unwrap();
        assert!(req.task_id.starts_with("task_"));
        assert_eq!(req.priority, 1);
        assert_eq!(req.deadline_ms, None);
        assert_eq!(req.required_resources.get(CPU), Some(0.5));
        assert_eq!(req.required_resources.get(MEM_GB), Some(1.0));
        assert_eq!(req.payload["op"], "train");
    }

    #[test]
    fn test_request_validation() {
        let ok = TaskRequest::new(()).with_id("t1");
        assert!(ok.validate().is_ok());

        let empty_id = TaskRequest::new(()).with_id(" ");
        assert!(empty_id.validate().is_err());

        let negative = TaskRequest::new(()).with_resources(ResourceProfile::from([(CPU, -1.0)]));
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_failure_result_carries_error_metric() {
        let result = TaskResult::failure("t1", &TaskFailure::Timeout(Duration::from_secs(300)));
        assert!(!result.is_success());
        assert_eq!(result.error(), Some("timeout after 300s"));
        assert!(result.artifacts().is_empty());
    }

    #[test]
    fn test_result_json_shape() {
        let mut metrics = TaskMetrics::new();
        metrics.insert("accuracy".into(), 0.95.into());
        let result = TaskResult::success("t1", metrics).with_artifact("s3://bucket/model");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["task_id"], "t1");
        assert_eq!(json["success"], true);
        assert_eq!(json["metrics"]["accuracy"], 0.95);
        assert_eq!(json["artifacts"][0], "s3://bucket/model");
    }
}
