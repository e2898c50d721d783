//! Device-facing route handlers.

use super::*;

pub(super) async fn handle_get_task(
    State(state): State<DispatchServerState>,
    body: Bytes,
) -> Response {
    let request = match parse_get_task_request(&body) {
        Ok(request) => request,
        Err(error) => {
            tracing::debug!("{error}");
            return error.into_response();
        }
    };

    let tasks = match state
        .runtime
        .fetch_tasks(&request.device, current_unix_timestamp_ms())
    {
        FetchOutcome::Unbound => {
            tracing::debug!(
                device = %request.device,
                user = %request.user,
                "task poll from unbound device"
            );
            Vec::new()
        }
        FetchOutcome::Pending(tasks) => tasks,
    };
    (StatusCode::OK, Json(GetTaskResponse { tasks })).into_response()
}

pub(super) async fn handle_report_status(
    State(state): State<DispatchServerState>,
    body: Bytes,
) -> Response {
    let request = match parse_report_status_request(&body) {
        Ok(request) => request,
        Err(error) => {
            tracing::debug!("{error}");
            return error.into_response();
        }
    };

    let Some(binding) = state.runtime.acknowledge(&request.device, &request.task) else {
        tracing::debug!(
            device = %request.device,
            task = %request.task,
            "status report from unbound device"
        );
        return StatusCode::OK.into_response();
    };

    let text = render_task_result_message(&request.status);
    let image = image_payload(request.payload.as_deref()).map(str::to_string);
    state
        .relay
        .notify_in_background(binding.channel, text, image);
    StatusCode::OK.into_response()
}
