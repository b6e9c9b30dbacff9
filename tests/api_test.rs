//! Message handling, health and cross-worker metrics.

use std::sync::Arc;
use std::time::Duration;

use prometheus_task_worker::config::WorkerConfig;
use prometheus_task_worker::core::{
    body_fn, InMemoryReporter, MetricsSource, ResourceProfile, TaskBody, TaskContext, TaskMetrics,
    Worker, WorkerDirectory, CPU, MEM_GB,
};
use prometheus_task_worker::runtime::{
    handle_message, health, AdmissionResponse, AdmissionStatus, AgentMessage,
};
use serde_json::{json, Value};

fn config(id: &str) -> WorkerConfig {
    WorkerConfig::new()
        .with_worker_id(id)
        .with_max_concurrent_tasks(4)
        .with_task_timeout(Duration::from_secs(10))
        .with_resource_limits(ResourceProfile::from([(CPU, 2.0), (MEM_GB, 8.0)]))
}

fn echo_body() -> impl TaskBody<Value> {
    body_fn(|payload: Value, _ctx: TaskContext| async move {
        let mut metrics = TaskMetrics::new();
        if let Some(model) = payload.get("model").and_then(Value::as_str) {
            metrics.insert("model".into(), model.into());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(metrics)
    })
}

fn message(payload: Value) -> AgentMessage {
    AgentMessage {
        payload_type: "TaskRequest".into(),
        payload,
        sender: Some("orchestrator".into()),
    }
}

#[tokio::test]
async fn test_task_request_message_is_queued() {
    let reporter = InMemoryReporter::new();
    let worker = Worker::new(
        config("api-1"),
        echo_body(),
        Arc::new(reporter.clone()),
    )
    .unwrap();

    let response = handle_message(
        &worker,
        message(json!({
            "task_id": "train-42",
            "payload": {"model": "resnet"},
            "priority": 3,
            "required_resources": {"cpu": 1.0, "mem_gb": 2.0}
        })),
    )
    .await;
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"task_id": "train-42", "status": "queued"})
    );
    assert_eq!(response.task_id(), Some("train-42"));

    worker.shutdown().await;
    let results = reporter.results_for("train-42");
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_defaults_apply_to_sparse_request() {
    let worker = Worker::new(
        config("api-2"),
        echo_body(),
        Arc::new(InMemoryReporter::new()),
    )
    .unwrap();

    let response = handle_message(&worker, message(json!({"payload": {}}))).await;
    let task_id = response.task_id().expect("accepted").to_string();
    assert!(task_id.starts_with("task_"));
    // Default requirement is half a CPU and 1 GB.
    let load = worker.load();
    assert_eq!(load.get(CPU), Some(0.5));
    assert_eq!(load.get(MEM_GB), Some(1.0));
    worker.shutdown().await;
}

#[tokio::test]
async fn test_over_capacity_message_is_rejected() {
    let worker = Worker::new(
        config("api-3"),
        echo_body(),
        Arc::new(InMemoryReporter::new()),
    )
    .unwrap();

    let response = handle_message(
        &worker,
        message(json!({"payload": {}, "required_resources": {"cpu": 3.0}})),
    )
    .await;
    assert_eq!(response.error_code(), Some("insufficient_resources"));
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["error"], "insufficient_resources");
    assert!(json["detail"].as_str().unwrap().contains("cpu"));
    assert_eq!(worker.load().amount(CPU), 0.0);
    worker.shutdown().await;
}

#[tokio::test]
async fn test_malformed_and_unknown_messages() {
    let worker = Worker::new(
        config("api-4"),
        echo_body(),
        Arc::new(InMemoryReporter::new()),
    )
    .unwrap();

    let malformed = handle_message(&worker, message(json!({"priority": "high"}))).await;
    assert_eq!(malformed.error_code(), Some("invalid_request"));

    let unknown = handle_message(
        &worker,
        AgentMessage {
            payload_type: "Heartbeat".into(),
            payload: json!({}),
            sender: None,
        },
    )
    .await;
    assert_eq!(
        unknown,
        AdmissionResponse::Unhandled {
            status: AdmissionStatus::UnhandledMessageType
        }
    );
    assert_eq!(worker.snapshot().totals.submitted, 0);
    worker.shutdown().await;
}

#[tokio::test]
async fn test_health_and_directory() {
    let first = Arc::new(
        Worker::new(
            config("dir-a"),
            echo_body(),
            Arc::new(InMemoryReporter::new()),
        )
        .unwrap(),
    );
    let second = Arc::new(
        Worker::new(
            config("dir-b"),
            echo_body(),
            Arc::new(InMemoryReporter::new()),
        )
        .unwrap(),
    );

    let status = health(&*first);
    assert!(status.ok);
    assert_eq!(status.worker_id, "dir-a");

    let directory = WorkerDirectory::new();
    directory.register(first.id(), Arc::clone(&first) as Arc<dyn MetricsSource>);
    directory.register(second.id(), Arc::clone(&second) as Arc<dyn MetricsSource>);

    handle_message(
        &*first,
        message(json!({"payload": {}, "required_resources": {"cpu": 1.5}})),
    )
    .await;

    let all = directory.collect();
    assert_eq!(all.len(), 2);
    assert_eq!(all["dir-a"].active_tasks, 1);
    assert!((all["dir-a"].cpu_usage - 1.5).abs() < 1e-9);
    assert_eq!(all["dir-b"].active_tasks, 0);

    first.shutdown().await;
    second.shutdown().await;
    assert!(!health(&*first).ok);
    assert!(directory.unregister("dir-a"));
    assert_eq!(directory.len(), 1);
}
