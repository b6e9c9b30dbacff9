//! Explicit directory of worker instances for cross-worker metrics.
//!
//! Callers create one directory, register workers as they start and
//! unregister them on teardown. Nothing is global.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{MetricsSource, WorkerMetrics};

/// Worker identifier.
pub type WorkerId = String;

/// Registered workers keyed by id.
#[derive(Default)]
pub struct WorkerDirectory {
    workers: RwLock<HashMap<WorkerId, Arc<dyn MetricsSource>>>,
}

impl WorkerDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker. Replaces and returns any previous entry with the
    /// same id.
    pub fn register(
        &self,
        id: impl Into<WorkerId>,
        worker: Arc<dyn MetricsSource>,
    ) -> Option<Arc<dyn MetricsSource>> {
        let id = id.into();
        tracing::debug!(worker_id = %id, "worker registered");
        self.workers.write().insert(id, worker)
    }

    /// Remove a worker. Returns true if it was registered.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.workers.write().remove(id).is_some();
        if removed {
            tracing::debug!(worker_id = %id, "worker unregistered");
        }
        removed
    }

    /// Number of registered workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.read().len()
    }

    /// True when no workers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.read().is_empty()
    }

    /// Metrics of every registered worker.
    #[must_use]
    pub fn collect(&self) -> HashMap<WorkerId, WorkerMetrics> {
        let workers: Vec<_> = self
            .workers
            .read()
            .iter()
            .map(|(id, w)| (id.clone(), Arc::clone(w)))
            .collect();
        workers
            .into_iter()
            .map(|(id, w)| (id, w.snapshot()))
            .collect()
    }

    /// Unregister every worker.
    pub fn clear(&self) {
        self.workers.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(usize);

    impl MetricsSource for Fixed {
        fn snapshot(&self) -> WorkerMetrics {
            WorkerMetrics {
                active_tasks: self.0,
                ..WorkerMetrics::default()
            }
        }
    }

    #[test]
    fn test_register_collect_unregister() {
        let directory = WorkerDirectory::new();
        directory.register("w1", Arc::new(Fixed(1)));
        directory.register("w2", Arc::new(Fixed(2)));

        let all = directory.collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all["w2"].active_tasks, 2);

        assert!(directory.unregister("w1"));
        assert!(!directory.unregister("w1"));
        assert_eq!(directory.len(), 1);

        directory.clear();
        assert!(directory.is_empty());
    }

    #[test]
    fn test_register_replaces() {
        let directory = WorkerDirectory::new();
        assert!(directory.register("w", Arc::new(Fixed(1))).is_none());
        assert!(directory.register("w", Arc::new(Fixed(3))).is_some());
        assert_eq!(directory.collect()["w"].active_tasks, 3);
    }
}
