//! API-facing request/response models.
//!
//! The transport (queue polling, RPC) is out of scope; it hands parsed
//! messages to [`handle_message`] or requests to [`handle_request`] and sends
//! back the [`AdmissionResponse`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{TaskBody, TaskId, TaskRequest, Worker, WorkerError};

/// `payload_type` of messages carrying a task request.
pub const TASK_REQUEST_TYPE: &str = "TaskRequest";

/// Message envelope as delivered by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Discriminator for `payload`.
    pub payload_type: String,
    /// Message body.
    pub payload: serde_json::Value,
    /// Optional sender identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// Status values in admission responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStatus {
    /// Task admitted and executing.
    Queued,
    /// The envelope did not carry a task request.
    UnhandledMessageType,
}

/// Response returned to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdmissionResponse {
    /// `{"task_id": ..., "status": "queued"}`
    Accepted {
        /// Admitted task.
        task_id: TaskId,
        /// Always `queued`.
        status: AdmissionStatus,
    },
    /// `{"error": "insufficient_resources", "detail": ...}`
    Rejected {
        /// Machine-readable rejection code.
        error: String,
        /// Human-readable explanation.
        detail: String,
    },
    /// `{"status": "unhandled_message_type"}`
    Unhandled {
        /// Always `unhandled_message_type`.
        status: AdmissionStatus,
    },
}

impl AdmissionResponse {
    /// Rejection code, if this is a rejection.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Rejected { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Admitted task id, if accepted.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Accepted { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}

impl From<&WorkerError> for AdmissionResponse {
    fn from(err: &WorkerError) -> Self {
        Self::Rejected {
            error: err.code().to_string(),
            detail: err.to_string(),
        }
    }
}

/// Submit a parsed request and turn the outcome into a response.
pub async fn handle_request<P, B>(worker: &Worker<P, B>, req: TaskRequest<P>) -> AdmissionResponse
where
    P: Send + 'static,
    B: TaskBody<P>,
{
    match worker.submit(req).await {
        Ok(admission) => AdmissionResponse::Accepted {
            task_id: admission.task_id,
            status: AdmissionStatus::Queued,
        },
        Err(e) => AdmissionResponse::from(&e),
    }
}

/// Dispatch an envelope: task requests are parsed and submitted, anything
/// else is answered with `unhandled_message_type`.
pub async fn handle_message<P, B>(worker: &Worker<P, B>, message: AgentMessage) -> AdmissionResponse
where
    P: DeserializeOwned + Send + 'static,
    B: TaskBody<P>,
{
    if message.payload_type != TASK_REQUEST_TYPE {
        tracing::debug!(payload_type = %message.payload_type, "unhandled message type");
        return AdmissionResponse::Unhandled {
            status: AdmissionStatus::UnhandledMessageType,
        };
    }
    match serde_json::from_value::<TaskRequest<P>>(message.payload) {
        Ok(req) => handle_request(worker, req).await,
        Err(e) => AdmissionResponse::from(&WorkerError::InvalidRequest(e.to_string())),
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag: false once shutdown has begun.
    pub ok: bool,
    /// Worker identifier.
    pub worker_id: String,
}

/// Return a health payload.
#[must_use]
pub fn health<P, B>(worker: &Worker<P, B>) -> Health
where
    P: Send + 'static,
    B: TaskBody<P>,
{
    Health {
        ok: !worker.is_shutting_down(),
        worker_id: worker.id().to_string(),
    }
}
