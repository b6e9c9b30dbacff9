//! Registry of admitted tasks: those waiting for a concurrency slot and those
//! running. Not synchronized on its own; the worker guards it together with
//! the resource ledger.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{ResourceProfile, TaskId};

/// Handle to a running execution.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    /// Cancels this execution only.
    pub cancel: CancellationToken,
    /// When the body was launched.
    pub started_at: Instant,
    /// Priority hint from the request.
    pub priority: i32,
    /// Resources held by the execution.
    pub required: ResourceProfile,
}

/// Point-in-time status of an admitted task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskStatus {
    /// Resources reserved, waiting for a concurrency slot.
    AwaitingSlot,
    /// Body is executing.
    Running {
        /// Time since launch.
        elapsed: Duration,
        /// Priority hint from the request.
        priority: i32,
        /// Resources held by the execution.
        required: ResourceProfile,
    },
}

/// Waiting and running tasks keyed by id.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    waiting: HashSet<TaskId>,
    running: HashMap<TaskId, TaskHandle>,
}

impl TaskRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the id is waiting or running.
    #[must_use]
    pub fn contains(&self, task_id: &str) -> bool {
        self.waiting.contains(task_id) || self.running.contains_key(task_id)
    }

    /// Record a task that holds resources but no slot yet.
    /// Returns false if the id is already known.
    pub fn insert_waiting(&mut self, task_id: TaskId) -> bool {
        if self.contains(&task_id) {
            return false;
        }
        self.waiting.insert(task_id)
    }

    /// Move a waiting task to running.
    pub fn promote(&mut self, task_id: TaskId, handle: TaskHandle) {
        self.waiting.remove(&task_id);
        self.running.insert(task_id, handle);
    }

    /// Drop the entry for `task_id`, wherever it is. Returns true if
    /// something was removed.
    pub fn remove(&mut self, task_id: &str) -> bool {
        self.running.remove(task_id).is_some() || self.waiting.remove(task_id)
    }

    /// Status of one task.
    #[must_use]
    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        if let Some(handle) = self.running.get(task_id) {
            return Some(TaskStatus::Running {
                elapsed: handle.started_at.elapsed(),
                priority: handle.priority,
                required: handle.required.clone(),
            });
        }
        self.waiting
            .contains(task_id)
            .then_some(TaskStatus::AwaitingSlot)
    }

    /// Number of running tasks.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.running.len()
    }

    /// Number of tasks waiting for a slot.
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// True when nothing is waiting or running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty() && self.running.is_empty()
    }

    /// Cancellation tokens of every running task.
    #[must_use]
    pub fn cancellation_tokens(&self) -> Vec<CancellationToken> {
        self.running.values().map(|h| h.cancel.clone()).collect()
    }

    /// Ids of running tasks.
    pub fn running_ids(&self) -> impl Iterator<Item = &str> {
        self.running.keys().map(String::as_str)
    }
}
