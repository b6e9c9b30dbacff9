//! Result reporters.
//!
//! A [`Reporter`] receives every [`TaskResult`] exactly once. Metadata is
//! added by wrapping a base reporter ([`NodeMetadataReporter`]) rather than
//! by specializing it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ReportError, TaskResult};

/// Receiver of task outcomes, typically the fleet orchestrator.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Deliver one result.
    ///
    /// # Errors
    ///
    /// Returns a [`ReportError`] when delivery failed. The worker logs it and
    /// moves on; results are never re-sent.
    async fn report(&self, result: TaskResult) -> Result<(), ReportError>;
}

/// Base reporter that records each result as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    async fn report(&self, result: TaskResult) -> Result<(), ReportError> {
        if result.is_success() {
            tracing::info!(
                task_id = result.task_id(),
                metrics = ?result.metrics(),
                artifacts = ?result.artifacts(),
                "task result"
            );
        } else {
            tracing::warn!(
                task_id = result.task_id(),
                error = result.error().unwrap_or("unknown"),
                artifacts = ?result.artifacts(),
                "task result"
            );
        }
        Ok(())
    }
}

/// Reporter that drops every result.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardReporter;

#[async_trait]
impl Reporter for DiscardReporter {
    async fn report(&self, _result: TaskResult) -> Result<(), ReportError> {
        Ok(())
    }
}

/// In-memory reporter for testing and dev.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReporter {
    results: Arc<Mutex<Vec<TaskResult>>>,
}

impl InMemoryReporter {
    /// Create an empty reporter. Clones share the same storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the results received so far, in arrival order.
    #[must_use]
    pub fn results(&self) -> Vec<TaskResult> {
        self.results.lock().clone()
    }

    /// Results for one task id.
    #[must_use]
    pub fn results_for(&self, task_id: &str) -> Vec<TaskResult> {
        self.results
            .lock()
            .iter()
            .filter(|r| r.task_id() == task_id)
            .cloned()
            .collect()
    }

    /// Number of results received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    /// True when nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.lock().is_empty()
    }
}

#[async_trait]
impl Reporter for InMemoryReporter {
    async fn report(&self, result: TaskResult) -> Result<(), ReportError> {
        self.results.lock().push(result);
        Ok(())
    }
}

/// Deployment location of this worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMetadata {
    /// Node (host) name.
    pub node_name: String,
    /// Pod (instance) name.
    pub pod_name: String,
}

impl NodeMetadata {
    /// Fallback used when the environment does not name the node or pod.
    pub const LOCAL: &'static str = "local";

    /// Read `K8S_NODE_NAME` and `K8S_POD_NAME`, defaulting each to `local`.
    #[must_use]
    pub fn from_env() -> Self {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| Self::LOCAL.to_string())
        };
        Self {
            node_name: read("K8S_NODE_NAME"),
            pod_name: read("K8S_POD_NAME"),
        }
    }

    /// Artifact location identifying where a task ran.
    #[must_use]
    pub fn task_location(&self, task_id: &str) -> String {
        format!("k8s://{}/{}/tasks/{task_id}", self.node_name, self.pod_name)
    }
}

/// Decorator appending the node/pod location of each task to its artifacts
/// before delegating to the wrapped reporter.
#[derive(Clone)]
pub struct NodeMetadataReporter {
    inner: Arc<dyn Reporter>,
    metadata: NodeMetadata,
}

impl NodeMetadataReporter {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn Reporter>, metadata: NodeMetadata) -> Self {
        Self { inner, metadata }
    }

    /// Metadata attached to results.
    #[must_use]
    pub const fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }
}

#[async_trait]
impl Reporter for NodeMetadataReporter {
    async fn report(&self, result: TaskResult) -> Result<(), ReportError> {
        let location = self.metadata.task_location(result.task_id());
        self.inner.report(result.with_artifact(location)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskMetrics;

    #[tokio::test]
    async fn test_in_memory_reporter_collects() {
        let reporter = InMemoryReporter::new();
        let shared = reporter.clone();
        reporter
            .report(TaskResult::success("t1", TaskMetrics::new()))
            .await
            .unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared.results_for("t1").len(), 1);
        assert!(shared.results_for("t2").is_empty());
    }

    #[tokio::test]
    async fn test_node_metadata_decorator_appends_location() {
        let base = InMemoryReporter::new();
        let reporter = NodeMetadataReporter::new(
            Arc::new(base.clone()),
            NodeMetadata {
                node_name: "node-a".into(),
                pod_name: "worker-0".into(),
            },
        );
        let result = TaskResult::success("t1", TaskMetrics::new()).with_artifact("s3://out/t1");
        reporter.report(result).await.unwrap();

        let delivered = base.results();
        assert_eq!(
            delivered[0].artifacts(),
            ["s3://out/t1".to_string(), "k8s://node-a/worker-0/tasks/t1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_decorator_propagates_inner_failure() {
        struct Unreachable;

        #[async_trait]
        impl Reporter for Unreachable {
            async fn report(&self, _result: TaskResult) -> Result<(), ReportError> {
                Err(ReportError::Network("connection refused".into()))
            }
        }

        let reporter = NodeMetadataReporter::new(
            Arc::new(Unreachable),
            NodeMetadata {
                node_name: "n".into(),
                pod_name: "p".into(),
            },
        );
        let err = reporter
            .report(TaskResult::success("t1", TaskMetrics::new()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "network error: connection refused");
    }
}
