//! # Prometheus Task Worker
//!
//! The admission-control and execution core of a task worker node.
//!
//! A worker accepts task requests, admits them only while resource capacity
//! is available, runs each admitted task under a concurrency bound and a
//! per-task timeout, keeps a live ledger of committed resources, and reports
//! every outcome to an external orchestrator.
//!
//! ## Core Problem Solved
//!
//! A worker node in a task fleet has finite CPU and memory. Accepting work
//! blindly oversubscribes the node; losing track of what is running leaks
//! capacity; a hung task body must not hold its share forever; and shutdown
//! must not abandon executions half-way through mutating shared state.
//!
//! ## Key Features
//!
//! - **Race-free admission**: resource check and commit are one atomic step
//! - **Bounded concurrency**: at most `max_concurrent_tasks` bodies run at once
//! - **Per-task timeout**: bodies are cancelled at the deadline and reported as failures
//! - **Exact accounting**: every exit path releases exactly what was committed
//! - **Scoped drain**: shutdown cancels and awaits every in-flight execution
//! - **Composable reporting**: metadata decorators wrap a base reporter
//!
//! ## Example
//!
//! ```rust,ignore
//! use prometheus_task_worker::builders::build_worker;
//! use prometheus_task_worker::config::WorkerConfig;
//! use prometheus_task_worker::core::{body_fn, ResourceProfile, TaskMetrics, TaskRequest};
//!
//! let worker = build_worker(
//!     WorkerConfig::new().with_max_concurrent_tasks(4),
//!     body_fn(|payload: serde_json::Value, ctx| async move {
//!         let mut metrics = TaskMetrics::new();
//!         metrics.insert("accuracy".into(), 0.95.into());
//!         Ok(metrics)
//!     }),
//! )?;
//!
//! let req = TaskRequest::new(serde_json::json!({"model": "resnet"}))
//!     .with_resources(ResourceProfile::from([("cpu", 1.0), ("mem_gb", 2.0)]));
//! let admission = worker.submit(req).await?;
//! println!("{:?}", worker.snapshot());
//! worker.shutdown().await;
//! ```
//!
//! For complete examples, see:
//! - `tests/admission_test.rs` - admission and accounting
//! - `tests/execution_test.rs` - timeouts, failures and reporting
//! - `tests/shutdown_test.rs` - drain behavior

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Admission control, execution and resource accounting.
pub mod core;
/// Configuration models for limits, timeouts and reporters.
pub mod config;
/// Builders to construct workers from configuration.
pub mod builders;
/// Inbound request handling and response models.
pub mod runtime;
/// Shared utilities.
pub mod util;
