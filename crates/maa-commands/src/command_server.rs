//! HTTP surface for operator commands (`POST /maa/command`).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use maa_dispatch::DispatchRuntime;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::command_handlers::{
    execute_operator_command, OperatorCommandContext, OperatorCommandRequest,
};

pub const COMMAND_ENDPOINT: &str = "/maa/command";

#[derive(Debug)]
struct CommandApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl CommandApiError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for CommandApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": {
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
struct OperatorCommandBody {
    #[serde(default)]
    operator: String,
    #[serde(default)]
    channel: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorCommandResponse {
    pub messages: Vec<String>,
}

#[derive(Clone)]
pub struct CommandServerState {
    runtime: Arc<DispatchRuntime>,
    context: OperatorCommandContext,
}

impl CommandServerState {
    pub fn new(runtime: Arc<DispatchRuntime>, context: OperatorCommandContext) -> Self {
        Self { runtime, context }
    }
}

pub fn build_command_router(state: CommandServerState) -> Router {
    Router::new()
        .route(COMMAND_ENDPOINT, post(handle_operator_command))
        .with_state(state)
}

async fn handle_operator_command(State(state): State<CommandServerState>, body: Bytes) -> Response {
    let body = match serde_json::from_slice::<OperatorCommandBody>(&body) {
        Ok(body) => body,
        Err(error) => {
            return CommandApiError::bad_request(
                "malformed_json",
                format!("failed to parse request body: {error}"),
            )
            .into_response();
        }
    };
    let operator_id = body.operator.trim();
    if operator_id.is_empty() {
        return CommandApiError::bad_request("missing_operator", "operator must be non-empty")
            .into_response();
    }
    if body.text.trim().is_empty() {
        return CommandApiError::bad_request("missing_text", "text must be non-empty")
            .into_response();
    }

    // Operators without an explicit channel get replies and results on their own id.
    let channel = if body.channel.trim().is_empty() {
        operator_id.to_string()
    } else {
        body.channel.trim().to_string()
    };
    let request = OperatorCommandRequest {
        operator_id: operator_id.to_string(),
        channel,
        text: body.text,
    };
    let messages = execute_operator_command(&state.runtime, &state.context, &request);
    (StatusCode::OK, Json(OperatorCommandResponse { messages })).into_response()
}
