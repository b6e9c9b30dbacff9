//! The worker: admission control, bounded-concurrency execution and drain.
//!
//! # Design
//!
//! - **One lock**: the resource ledger and the task registry live behind a
//!   single `parking_lot::Mutex`, so a capacity check, its commit and the
//!   registry insert are one step, and so are release and removal.
//! - **Ticket cleanup**: each admitted task owns an [`AdmissionTicket`] whose
//!   `Drop` releases its resources and registry entry. Every exit path
//!   (success, failure, timeout, cancellation, the future being dropped)
//!   goes through it exactly once.
//! - **Slots second**: resources gate first; a resource-admitted task then
//!   waits on a tokio semaphore for one of `max_concurrent_tasks` slots.
//! - **Tracked executions**: executions run on a `TaskTracker`, and are
//!   spawned while the lock is held so shutdown cannot miss one.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::util::clock::now_ms;

use super::executor::{run_with_deadline, TaskBody, TaskContext, TaskOutcome};
use super::metrics::WorkerCounters;
use super::{
    MetricsSource, Reporter, ResourceLedger, ResourceProfile, TaskFailure, TaskHandle, TaskId,
    TaskRegistry, TaskRequest, TaskStatus, WorkerError, WorkerMetrics,
};

/// Successful admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Identifier of the admitted task.
    pub task_id: TaskId,
}

/// Shared mutable state. Only ever touched with `Shared::state` locked.
struct WorkerState {
    ledger: ResourceLedger,
    registry: TaskRegistry,
    accepting: bool,
}

/// State shared between the worker handle and its executions.
struct Shared {
    worker_id: String,
    task_timeout: Duration,
    state: Mutex<WorkerState>,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    drained: Notify,
    reporter: Arc<dyn Reporter>,
    counters: WorkerCounters,
}

/// Reservation of resources (and later a concurrency slot) for one task.
/// Dropping it releases both and removes the task from the registry.
struct AdmissionTicket {
    shared: Arc<Shared>,
    task_id: TaskId,
    required: ResourceProfile,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        let idle = {
            let mut state = self.shared.state.lock();
            state.ledger.release(&self.required);
            state.registry.remove(&self.task_id);
            state.registry.is_empty()
        };
        // Give the slot back only after the ledger reflects the release.
        drop(self.permit.take());
        debug!(
            worker_id = %self.shared.worker_id,
            task_id = %self.task_id,
            "released task resources"
        );
        if idle {
            self.shared.drained.notify_waiters();
        }
    }
}

/// Admission-controlled task worker.
///
/// `P` is the payload type handed to the task body `B`.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use prometheus_task_worker::config::WorkerConfig;
/// use prometheus_task_worker::core::{body_fn, LogReporter, TaskMetrics, TaskRequest, Worker};
///
/// let body = body_fn(|payload: serde_json::Value, _ctx| async move {
///     Ok(TaskMetrics::new())
/// });
/// let worker = Worker::new(WorkerConfig::new(), body, Arc::new(LogReporter))?;
/// let admission = worker.submit(TaskRequest::new(serde_json::json!({"op": "train"}))).await?;
/// worker.shutdown().await;
/// ```
pub struct Worker<P, B>
where
    P: Send + 'static,
    B: TaskBody<P>,
{
    config: WorkerConfig,
    shared: Arc<Shared>,
    body: B,
    _payload: PhantomData<fn(P)>,
}

impl<P, B> Worker<P, B>
where
    P: Send + 'static,
    B: TaskBody<P>,
{
    /// Create a worker.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::InvalidConfig` if the configuration is invalid;
    /// the worker does not start.
    pub fn new(
        config: WorkerConfig,
        body: B,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, WorkerError> {
        config.validate().map_err(WorkerError::InvalidConfig)?;

        let shared = Arc::new(Shared {
            worker_id: config.worker_id.clone(),
            task_timeout: config.task_timeout(),
            state: Mutex::new(WorkerState {
                ledger: ResourceLedger::new(&config.resource_limits),
                registry: TaskRegistry::new(),
                accepting: true,
            }),
            slots: Arc::new(Semaphore::new(config.max_concurrent_tasks)),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            drained: Notify::new(),
            reporter,
            counters: WorkerCounters::default(),
        });

        info!(
            worker_id = %config.worker_id,
            max_concurrent_tasks = config.max_concurrent_tasks,
            task_timeout_secs = config.task_timeout_secs,
            resource_limits = ?config.resource_limits,
            "worker initialized"
        );

        Ok(Self {
            config,
            shared,
            body,
            _payload: PhantomData,
        })
    }

    /// Worker identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.config.worker_id
    }

    /// Configuration the worker was built with.
    #[must_use]
    pub const fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Submit a task.
    ///
    /// Resources are checked and committed atomically; if they do not fit
    /// the request is rejected with no state change. An admitted request then
    /// waits for a concurrency slot, after which its execution is spawned and
    /// this call returns. The outcome is delivered to the reporter.
    ///
    /// # Errors
    ///
    /// - `WorkerError::InsufficientResources` if the load would exceed a limit
    /// - `WorkerError::DuplicateTask` if the id is already admitted
    /// - `WorkerError::DeadlineExpired` if the deadline has passed
    /// - `WorkerError::InvalidRequest` for malformed requests
    /// - `WorkerError::ShuttingDown` once shutdown has begun
    pub async fn submit(&self, task: TaskRequest<P>) -> Result<Admission, WorkerError> {
        WorkerCounters::bump(&self.shared.counters.submitted);
        let result = self.admit(task).await;
        if let Err(e) = &result {
            WorkerCounters::bump(&self.shared.counters.rejected);
            warn!(worker_id = %self.shared.worker_id, error = %e, "task rejected");
        }
        result
    }

    async fn admit(&self, task: TaskRequest<P>) -> Result<Admission, WorkerError> {
        task.validate().map_err(WorkerError::InvalidRequest)?;
        if let Some(deadline) = task.deadline_ms {
            if now_ms() > deadline {
                return Err(WorkerError::DeadlineExpired);
            }
        }

        let mut ticket = self.reserve(&task)?;

        let permit = Arc::clone(&self.shared.slots)
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::ShuttingDown)?;
        ticket.permit = Some(permit);

        self.launch(task, ticket)
    }

    /// Check and commit resources, recording the task as waiting for a slot.
    fn reserve(&self, task: &TaskRequest<P>) -> Result<AdmissionTicket, WorkerError> {
        let mut state = self.shared.state.lock();
        if !state.accepting {
            return Err(WorkerError::ShuttingDown);
        }
        if state.registry.contains(&task.task_id) {
            return Err(WorkerError::DuplicateTask(task.task_id.clone()));
        }
        state
            .ledger
            .try_commit(&task.required_resources)
            .map_err(|s| WorkerError::InsufficientResources {
                kind: s.kind,
                requested: s.requested,
                available: s.available,
            })?;
        state.registry.insert_waiting(task.task_id.clone());
        drop(state);

        debug!(
            worker_id = %self.shared.worker_id,
            task_id = %task.task_id,
            required = ?task.required_resources,
            "resources reserved"
        );

        Ok(AdmissionTicket {
            shared: Arc::clone(&self.shared),
            task_id: task.task_id.clone(),
            required: task.required_resources.clone(),
            permit: None,
        })
    }

    /// Register the task as running and spawn its execution.
    fn launch(&self, task: TaskRequest<P>, ticket: AdmissionTicket) -> Result<Admission, WorkerError> {
        let TaskRequest {
            task_id,
            payload,
            priority,
            required_resources,
            ..
        } = task;
        let cancel = self.shared.shutdown.child_token();

        let mut state = self.shared.state.lock();
        if !state.accepting {
            drop(state);
            drop(ticket);
            return Err(WorkerError::ShuttingDown);
        }
        state.registry.promote(
            task_id.clone(),
            TaskHandle {
                cancel: cancel.clone(),
                started_at: Instant::now(),
                priority,
                required: required_resources,
            },
        );
        let ctx = TaskContext::new(task_id.clone(), priority, cancel);
        self.shared.tracker.spawn(execute(
            Arc::clone(&self.shared),
            self.body.clone(),
            payload,
            ctx,
            ticket,
        ));
        drop(state);

        WorkerCounters::bump(&self.shared.counters.admitted);
        info!(worker_id = %self.shared.worker_id, task_id = %task_id, "task admitted");
        Ok(Admission { task_id })
    }

    /// Status of an admitted task, or `None` once it reached a terminal state
    /// (or was never admitted).
    #[must_use]
    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        self.shared.state.lock().registry.status(task_id)
    }

    /// Number of running tasks.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.shared.state.lock().registry.active_count()
    }

    /// Current committed load.
    #[must_use]
    pub fn load(&self) -> ResourceProfile {
        self.shared.state.lock().ledger.load()
    }

    /// Point-in-time metrics.
    #[must_use]
    pub fn snapshot(&self) -> WorkerMetrics {
        let (load, limits, active, waiting) = {
            let state = self.shared.state.lock();
            (
                state.ledger.load(),
                state.ledger.limits(),
                state.registry.active_count(),
                state.registry.waiting_count(),
            )
        };
        WorkerMetrics::new(load, limits, active, waiting, self.shared.counters.snapshot())
    }

    /// True once shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        !self.shared.state.lock().accepting
    }

    /// Stop accepting work, cancel every running task and wait until all of
    /// them reached a terminal state and released their resources.
    ///
    /// Returns the number of executions that were cancelled. Calling it again
    /// waits for the same drain and returns 0.
    pub async fn shutdown(&self) -> usize {
        let tokens = {
            let mut state = self.shared.state.lock();
            if state.accepting {
                state.accepting = false;
                state.registry.cancellation_tokens()
            } else {
                Vec::new()
            }
        };
        let cancelled = tokens.len();
        if cancelled > 0 || !self.shared.shutdown.is_cancelled() {
            info!(
                worker_id = %self.shared.worker_id,
                in_flight = cancelled,
                "shutting down worker"
            );
        }

        self.shared.slots.close();
        for token in &tokens {
            token.cancel();
        }
        self.shared.shutdown.cancel();

        self.shared.tracker.close();
        self.shared.tracker.wait().await;

        // Submitters still waiting for a slot hold reservations until they
        // observe the closed semaphore.
        loop {
            let drained = self.shared.drained.notified();
            if self.shared.state.lock().registry.is_empty() {
                break;
            }
            drained.await;
        }

        info!(worker_id = %self.shared.worker_id, "worker shut down");
        cancelled
    }
}

impl<P, B> MetricsSource for Worker<P, B>
where
    P: Send + 'static,
    B: TaskBody<P>,
{
    fn snapshot(&self) -> WorkerMetrics {
        Self::snapshot(self)
    }
}

impl<P, B> Drop for Worker<P, B>
where
    P: Send + 'static,
    B: TaskBody<P>,
{
    fn drop(&mut self) {
        // Signal cancellation but don't wait; explicit shutdown() drains.
        if !self.shared.shutdown.is_cancelled() {
            self.shared.state.lock().accepting = false;
            self.shared.slots.close();
            self.shared.shutdown.cancel();
            self.shared.tracker.close();
            debug!(
                worker_id = %self.shared.worker_id,
                "worker dropped without explicit shutdown - executions cancelled"
            );
        }
    }
}

/// One execution: run the body, build the result, release, report.
async fn execute<P, B>(
    shared: Arc<Shared>,
    body: B,
    payload: P,
    ctx: TaskContext,
    ticket: AdmissionTicket,
) where
    P: Send + 'static,
    B: TaskBody<P>,
{
    let task_id = ctx.task_id().to_string();
    debug!(worker_id = %shared.worker_id, task_id = %task_id, "executing task");

    let (outcome, elapsed) = run_with_deadline(&body, payload, ctx, shared.task_timeout).await;

    let counter = match &outcome {
        TaskOutcome::Completed(_) => &shared.counters.completed,
        TaskOutcome::Failed(TaskFailure::Timeout(_)) => &shared.counters.timed_out,
        TaskOutcome::Failed(TaskFailure::Cancelled) => &shared.counters.cancelled,
        TaskOutcome::Failed(TaskFailure::Execution(_)) => &shared.counters.failed,
    };
    WorkerCounters::bump(counter);

    let result = outcome.into_result(&task_id, elapsed);
    info!(
        worker_id = %shared.worker_id,
        task_id = %task_id,
        success = result.is_success(),
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        "task finished"
    );

    // Ledger and registry are final before the reporter sees the result.
    drop(ticket);

    if let Err(e) = shared.reporter.report(result).await {
        WorkerCounters::bump(&shared.counters.report_failures);
        error!(
            worker_id = %shared.worker_id,
            task_id = %task_id,
            error = %e,
            "failed to report task result"
        );
    }
}
