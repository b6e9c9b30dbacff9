//! Benchmarks for admission accounting and end-to-end submission.
//!
//! Benchmarks cover:
//! - Ledger check-and-commit / release cycles
//! - Rejection path when a limit is exhausted
//! - Worker submit throughput with a no-op body

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

use prometheus_task_worker::config::WorkerConfig;
use prometheus_task_worker::core::{
    body_fn, DiscardReporter, ResourceLedger, ResourceProfile, TaskContext, TaskMetrics,
    TaskRequest, Worker, CPU, MEM_GB,
};
use tokio::runtime::Runtime;

fn limits() -> ResourceProfile {
    ResourceProfile::from([(CPU, 64.0), (MEM_GB, 256.0), ("gpu", 8.0)])
}

// ============================================================================
// Ledger
// ============================================================================

fn bench_ledger_commit_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_commit_release");

    for kinds in [1_usize, 3, 8] {
        let limits: ResourceProfile = (0..kinds).map(|i| (format!("r{i}"), 100.0)).collect();
        let required: ResourceProfile = (0..kinds).map(|i| (format!("r{i}"), 0.25)).collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(kinds), &kinds, |b, _| {
            let mut ledger = ResourceLedger::new(&limits);
            b.iter(|| {
                ledger.try_commit(black_box(&required)).ok();
                ledger.release(black_box(&required));
            });
        });
    }
    group.finish();
}

fn bench_ledger_rejection(c: &mut Criterion) {
    let mut ledger = ResourceLedger::new(&limits());
    let filler = ResourceProfile::from([(CPU, 64.0)]);
    ledger.try_commit(&filler).ok();
    let request = ResourceProfile::from([(CPU, 0.5), (MEM_GB, 1.0)]);

    c.bench_function("ledger_rejection", |b| {
        b.iter(|| black_box(ledger.check(black_box(&request))));
    });
}

// ============================================================================
// Worker
// ============================================================================

fn bench_worker_submit(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("worker_submit");

    for batch in [10_usize, 100] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.to_async(&rt).iter(|| async move {
                let body = body_fn(|(): (), _ctx: TaskContext| async { Ok(TaskMetrics::new()) });
                let config = WorkerConfig::new()
                    .with_max_concurrent_tasks(batch)
                    .with_resource_limits(limits());
                let worker = Worker::new(config, body, Arc::new(DiscardReporter))
                    .expect("valid config");
                for i in 0..batch {
                    let req = TaskRequest::new(())
                        .with_id(format!("bench-{i}"))
                        .with_resources(ResourceProfile::from([(CPU, 0.1)]));
                    worker.submit(req).await.ok();
                }
                worker.shutdown().await;
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_ledger_commit_release,
    bench_ledger_rejection,
    bench_worker_submit
);
criterion_main!(benches);
