//! Device protocol request/response/error types.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task_queue::QueuedTask;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct GetTaskRequest {
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub user: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetTaskResponse {
    pub tasks: Vec<QueuedTask>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ReportStatusRequest {
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEndpoint {
    GetTask,
    ReportStatus,
}

impl fmt::Display for DispatchEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetTask => f.write_str("getTask"),
            Self::ReportStatus => f.write_str("reportStatus"),
        }
    }
}

/// Malformed or incomplete device request; answered with 400 and no state change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {endpoint} request: {reason}")]
pub struct DispatchProtocolError {
    pub endpoint: DispatchEndpoint,
    pub reason: String,
}

impl DispatchProtocolError {
    fn new(endpoint: DispatchEndpoint, reason: impl Into<String>) -> Self {
        Self {
            endpoint,
            reason: reason.into(),
        }
    }
}

impl IntoResponse for DispatchProtocolError {
    fn into_response(self) -> Response {
        match self.endpoint {
            DispatchEndpoint::GetTask => (
                StatusCode::BAD_REQUEST,
                Json(GetTaskResponse::default()),
            )
                .into_response(),
            DispatchEndpoint::ReportStatus => StatusCode::BAD_REQUEST.into_response(),
        }
    }
}

pub fn parse_get_task_request(body: &[u8]) -> Result<GetTaskRequest, DispatchProtocolError> {
    let request = serde_json::from_slice::<GetTaskRequest>(body)
        .map_err(|error| DispatchProtocolError::new(DispatchEndpoint::GetTask, error.to_string()))?;
    if request.device.is_empty() {
        return Err(DispatchProtocolError::new(
            DispatchEndpoint::GetTask,
            "missing 'device'",
        ));
    }
    Ok(request)
}

pub fn parse_report_status_request(
    body: &[u8],
) -> Result<ReportStatusRequest, DispatchProtocolError> {
    let request = serde_json::from_slice::<ReportStatusRequest>(body).map_err(|error| {
        DispatchProtocolError::new(DispatchEndpoint::ReportStatus, error.to_string())
    })?;
    if request.device.is_empty() {
        return Err(DispatchProtocolError::new(
            DispatchEndpoint::ReportStatus,
            "missing 'device'",
        ));
    }
    if request.task.is_empty() {
        return Err(DispatchProtocolError::new(
            DispatchEndpoint::ReportStatus,
            "missing 'task'",
        ));
    }
    Ok(request)
}
