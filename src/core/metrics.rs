//! Point-in-time worker metrics for monitoring scrapes.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::{ResourceProfile, CPU, MEM_GB};

/// Snapshot of worker load and lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerMetrics {
    /// Committed CPU.
    pub cpu_usage: f64,
    /// Committed memory in GB.
    pub mem_usage_gb: f64,
    /// Running tasks (registry size).
    pub active_tasks: usize,
    /// Requests holding a reservation and waiting for a concurrency slot.
    pub queue_size: usize,
    /// Full committed load by resource kind.
    pub load: ResourceProfile,
    /// Configured limits.
    pub limits: ResourceProfile,
    /// Lifetime counters.
    pub totals: TaskTotals,
}

impl WorkerMetrics {
    /// Build a snapshot from the ledger view and counters.
    #[must_use]
    pub fn new(
        load: ResourceProfile,
        limits: ResourceProfile,
        active_tasks: usize,
        queue_size: usize,
        totals: TaskTotals,
    ) -> Self {
        Self {
            cpu_usage: load.amount(CPU),
            mem_usage_gb: load.amount(MEM_GB),
            active_tasks,
            queue_size,
            load,
            limits,
            totals,
        }
    }
}

/// Lifetime task counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTotals {
    /// Requests received.
    pub submitted: u64,
    /// Requests that started executing.
    pub admitted: u64,
    /// Requests turned away at admission.
    pub rejected: u64,
    /// Executions that succeeded.
    pub completed: u64,
    /// Executions whose body returned an error or panicked.
    pub failed: u64,
    /// Executions that hit the per-task timeout.
    pub timed_out: u64,
    /// Executions cancelled by shutdown.
    pub cancelled: u64,
    /// Results the reporter could not deliver.
    pub report_failures: u64,
}

/// Internal counters for worker statistics (lock-free).
#[derive(Debug, Default)]
pub(crate) struct WorkerCounters {
    pub submitted: AtomicU64,
    pub admitted: AtomicU64,
    pub rejected: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
    pub cancelled: AtomicU64,
    pub report_failures: AtomicU64,
}

impl WorkerCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current totals.
    pub fn snapshot(&self) -> TaskTotals {
        TaskTotals {
            submitted: self.submitted.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            report_failures: self.report_failures.load(Ordering::Relaxed),
        }
    }
}

/// Anything that can produce a [`WorkerMetrics`] snapshot.
pub trait MetricsSource: Send + Sync {
    /// Current metrics. Must not block on in-flight tasks.
    fn snapshot(&self) -> WorkerMetrics;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_pick_cpu_and_mem() {
        let load = ResourceProfile::from([(CPU, 1.2), (MEM_GB, 4.0), ("gpu", 1.0)]);
        let limits = ResourceProfile::from([(CPU, 2.0), (MEM_GB, 8.0)]);
        let m = WorkerMetrics::new(load, limits, 1, 0, TaskTotals::default());
        assert!((m.cpu_usage - 1.2).abs() < f64::EPSILON);
        assert!((m.mem_usage_gb - 4.0).abs() < f64::EPSILON);
        assert_eq!(m.load.get("gpu"), Some(1.0));
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = WorkerCounters::default();
        WorkerCounters::bump(&counters.submitted);
        WorkerCounters::bump(&counters.submitted);
        WorkerCounters::bump(&counters.timed_out);
        let totals = counters.snapshot();
        assert_eq!(totals.submitted, 2);
        assert_eq!(totals.timed_out, 1);
        assert_eq!(totals.completed, 0);
    }

    #[test]
    fn test_metrics_json_fields() {
        let m = WorkerMetrics::default();
        let json = serde_json::to_value(&m).unwrap();
        for key in ["cpu_usage", "mem_usage_gb", "active_tasks", "queue_size"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
