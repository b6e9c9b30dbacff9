//! Inbound request handling for whatever transport feeds the worker.

pub mod api;

pub use api::{
    handle_message, handle_request, health, AdmissionResponse, AdmissionStatus, AgentMessage,
    Health, TASK_REQUEST_TYPE,
};
