//! Task body capability and the bounded-time execution envelope around it.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::{AppResult, MetricValue, TaskFailure, TaskId, TaskMetrics, TaskResult, DURATION_METRIC};

/// Per-execution context handed to the task body.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task_id: TaskId,
    priority: i32,
    cancel: CancellationToken,
}

impl TaskContext {
    /// Build a context for one execution.
    #[must_use]
    pub const fn new(task_id: TaskId, priority: i32, cancel: CancellationToken) -> Self {
        Self {
            task_id,
            priority,
            cancel,
        }
    }

    /// Identifier of the task being executed.
    #[must_use]
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Priority hint from the request.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Token cancelled on timeout or worker shutdown. Bodies that spawn their
    /// own work or hold external resources should watch it.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Shorthand for `cancellation().is_cancelled()`.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// The business logic a worker runs for each admitted task.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_task_worker::core::{AppResult, TaskBody, TaskContext, TaskMetrics};
///
/// #[derive(Clone)]
/// struct Trainer;
///
/// #[async_trait]
/// impl TaskBody<serde_json::Value> for Trainer {
///     async fn run(&self, payload: serde_json::Value, ctx: TaskContext) -> AppResult<TaskMetrics> {
///         let mut metrics = TaskMetrics::new();
///         metrics.insert("accuracy".into(), 0.95.into());
///         Ok(metrics)
///     }
/// }
/// ```
#[async_trait]
pub trait TaskBody<P>: Send + Sync + Clone + 'static
where
    P: Send + 'static,
{
    /// Run the task to completion and return its metrics.
    ///
    /// The future may be dropped at any await point when the deadline
    /// expires or the worker shuts down.
    async fn run(&self, payload: P, ctx: TaskContext) -> AppResult<TaskMetrics>;
}

/// Adapter turning an async closure into a [`TaskBody`].
#[derive(Clone)]
pub struct FnBody<F>(F);

/// Wrap an async closure `Fn(P, TaskContext) -> Future<Output = AppResult<TaskMetrics>>`.
pub fn body_fn<P, F, Fut>(f: F) -> FnBody<F>
where
    P: Send + 'static,
    F: Fn(P, TaskContext) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = AppResult<TaskMetrics>> + Send + 'static,
{
    FnBody(f)
}

#[async_trait]
impl<P, F, Fut> TaskBody<P> for FnBody<F>
where
    P: Send + 'static,
    F: Fn(P, TaskContext) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = AppResult<TaskMetrics>> + Send + 'static,
{
    async fn run(&self, payload: P, ctx: TaskContext) -> AppResult<TaskMetrics> {
        (self.0)(payload, ctx).await
    }
}

/// Terminal state of one execution.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Body finished in time.
    Completed(TaskMetrics),
    /// Body did not finish in time, was cancelled, or failed.
    Failed(TaskFailure),
}

impl TaskOutcome {
    /// Turn the outcome into the result handed to the reporter. Successful
    /// results get a `duration` metric unless the body set one.
    #[must_use]
    pub fn into_result(self, task_id: &str, elapsed: Duration) -> TaskResult {
        match self {
            Self::Completed(mut metrics) => {
                metrics
                    .entry(DURATION_METRIC.to_string())
                    .or_insert(MetricValue::Number(elapsed.as_secs_f64()));
                TaskResult::success(task_id, metrics)
            }
            Self::Failed(failure) => TaskResult::failure(task_id, &failure)
                .with_metric(DURATION_METRIC, elapsed.as_secs_f64()),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .map_or_else(
            || "task body panicked".to_string(),
            |msg| format!("task body panicked: {msg}"),
        )
}

/// Run `body` under `timeout`, racing it against the context's cancellation
/// token. The deadline starts when this function is first polled.
///
/// On timeout the context token is cancelled too, so work the body spawned
/// off its own future can wind down.
pub async fn run_with_deadline<P, B>(
    body: &B,
    payload: P,
    ctx: TaskContext,
    timeout: Duration,
) -> (TaskOutcome, Duration)
where
    P: Send + 'static,
    B: TaskBody<P>,
{
    let cancel = ctx.cancellation().clone();
    let task_id = ctx.task_id().to_string();
    let started = Instant::now();
    let guarded = AssertUnwindSafe(body.run(payload, ctx)).catch_unwind();

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::warn!(task_id = %task_id, "task cancelled");
            TaskOutcome::Failed(TaskFailure::Cancelled)
        }
        res = tokio::time::timeout(timeout, guarded) => match res {
            Ok(Ok(Ok(metrics))) => TaskOutcome::Completed(metrics),
            Ok(Ok(Err(err))) => {
                tracing::error!(task_id = %task_id, error = %err, "task failed");
                TaskOutcome::Failed(TaskFailure::Execution(format!("{err:#}")))
            }
            Ok(Err(panic)) => {
                let msg = panic_message(panic.as_ref());
                tracing::error!(task_id = %task_id, error = %msg, "task failed");
                TaskOutcome::Failed(TaskFailure::Execution(msg))
            }
            Err(_) => {
                cancel.cancel();
                tracing::error!(task_id = %task_id, timeout_secs = timeout.as_secs_f64(), "task timed out");
                TaskOutcome::Failed(TaskFailure::Timeout(timeout))
            }
        },
    };

    (outcome, started.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn ctx(id: &str) -> (TaskContext, CancellationToken) {
        let token = CancellationToken::new();
        (TaskContext::new(id.to_string(), 1, token.clone()), token)
    }

    #[tokio::test]
    async fn test_completed_body_gets_duration() {
        let body = body_fn(|n: u32, _ctx: TaskContext| async move {
            let mut m = TaskMetrics::new();
            m.insert("value".into(), f64::from(n * 2).into());
            Ok(m)
        });
        let (ctx, _) = ctx("ok");
        let (outcome, elapsed) = run_with_deadline(&body, 21, ctx, Duration::from_secs(5)).await;
        let result = outcome.into_result("ok", elapsed);
        assert!(result.is_success());
        assert_eq!(result.metric("value"), Some(&MetricValue::Number(42.0)));
        assert!(result.metric(DURATION_METRIC).is_some());
    }

    #[tokio::test]
    async fn test_body_error_becomes_execution_failure() {
        let body = body_fn(|(): (), _ctx: TaskContext| async move {
            Err::<TaskMetrics, _>(anyhow!("disk full"))
        });
        let (ctx, _) = ctx("err");
        let (outcome, _) = run_with_deadline(&body, (), ctx, Duration::from_secs(5)).await;
        assert_eq!(outcome, TaskOutcome::Failed(TaskFailure::Execution("disk full".into())));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let body = body_fn(|(): (), _ctx: TaskContext| async move {
            if true {
                panic!("boom");
            }
            Ok(TaskMetrics::new())
        });
        let (ctx, _) = ctx("panic");
        let (outcome, _) = run_with_deadline(&body, (), ctx, Duration::from_secs(5)).await;
        match outcome {
            TaskOutcome::Failed(TaskFailure::Execution(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_context() {
        let body = body_fn(|(): (), _ctx: TaskContext| async move {
            tokio::time::sleep(Duration::from_secs(400)).await;
            Ok(TaskMetrics::new())
        });
        let (ctx, token) = ctx("slow");
        let (outcome, _) = run_with_deadline(&body, (), ctx, Duration::from_secs(300)).await;
        assert_eq!(
            outcome,
            TaskOutcome::Failed(TaskFailure::Timeout(Duration::from_secs(300)))
        );
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_external_cancellation_wins() {
        let body = body_fn(|(): (), _ctx: TaskContext| async move {
            std::future::pending::<()>().await;
            Ok(TaskMetrics::new())
        });
        let (ctx, token) = ctx("cancel");
        token.cancel();
        let (outcome, _) = run_with_deadline(&body, (), ctx, Duration::from_secs(5)).await;
        assert_eq!(outcome, TaskOutcome::Failed(TaskFailure::Cancelled));
    }

    #[test]
    fn test_failure_result_includes_duration() {
        let result = TaskOutcome::Failed(TaskFailure::Cancelled)
            .into_result("t", Duration::from_millis(1500));
        assert_eq!(result.error(), Some("cancelled"));
        assert_eq!(result.metric(DURATION_METRIC), Some(&MetricValue::Number(1.5)));
    }
}
