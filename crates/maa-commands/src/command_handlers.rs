//! Executes operator commands against the dispatch runtime and renders replies.

use maa_core::current_unix_timestamp_ms;
use maa_dispatch::{
    BindingError, DispatchRuntime, TaskPriority, CAPTURE_IMAGE_NOW_TASK_TYPE,
    GET_TASK_ENDPOINT, HEARTBEAT_TASK_TYPE, REPORT_STATUS_ENDPOINT, STOP_TASK_TYPE,
};

use crate::operator_command::{
    parse_operator_command, render_operator_command_help, OperatorCommand,
    OperatorCommandParseError,
};
use crate::task_aliases::{render_available_tasks, resolve_task_alias};

const BIND_FIRST_MESSAGE: &str = "Bind a device first: /maa bind <deviceId>";
const START_USAGE_MESSAGE: &str =
    "Specify the tasks to run\nUsage: /maa start ALL or /maa start Combat,Recruiting";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorCommandContext {
    /// Port advertised to the operator in the bind confirmation.
    pub http_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorCommandRequest {
    pub operator_id: String,
    pub channel: String,
    pub text: String,
}

fn abbreviate(value: &str, max_chars: usize) -> String {
    let prefix = value.chars().take(max_chars).collect::<String>();
    format!("{prefix}...")
}

/// Runs one operator command and returns the replies in order.
pub fn execute_operator_command(
    runtime: &DispatchRuntime,
    context: &OperatorCommandContext,
    request: &OperatorCommandRequest,
) -> Vec<String> {
    let command = match parse_operator_command(&request.text) {
        Ok(command) => command,
        Err(OperatorCommandParseError::Unknown { command }) => {
            return vec![format!(
                "Unknown command: {command}\n\n{}",
                render_operator_command_help()
            )];
        }
        Err(error) => return vec![error.to_string()],
    };
    tracing::debug!(operator = %request.operator_id, ?command, "operator command");

    let operator_id = request.operator_id.as_str();
    let reply = match command {
        OperatorCommand::Help => render_operator_command_help(),
        OperatorCommand::Bind { device_id } => {
            execute_bind(runtime, context, operator_id, &device_id, &request.channel)
        }
        OperatorCommand::Unbind => execute_unbind(runtime, operator_id),
        OperatorCommand::Status => execute_status(runtime, operator_id),
        OperatorCommand::Start { tasks } => execute_start(runtime, operator_id, &tasks),
        OperatorCommand::LinkStart => execute_start(runtime, operator_id, "ALL"),
        OperatorCommand::Screenshot => execute_head_task(
            runtime,
            operator_id,
            CAPTURE_IMAGE_NOW_TASK_TYPE,
            "Screenshot task queued; the screenshot will arrive shortly",
        ),
        OperatorCommand::Stop => execute_head_task(
            runtime,
            operator_id,
            STOP_TASK_TYPE,
            "Stop request sent",
        ),
        OperatorCommand::Heartbeat => execute_head_task(
            runtime,
            operator_id,
            HEARTBEAT_TASK_TYPE,
            "Heartbeat sent; the current task status will be reported back",
        ),
    };
    vec![reply]
}

fn execute_bind(
    runtime: &DispatchRuntime,
    context: &OperatorCommandContext,
    operator_id: &str,
    device_id: &str,
    channel: &str,
) -> String {
    match runtime.bind_device(operator_id, device_id, channel) {
        Ok(_) => {
            let port = context.http_port;
            format!(
                "Device bound.\n\n\
                 Device ID: {}\n\n\
                 Configure these endpoints in MAA:\n\
                 - Get task: http://<your-ip>:{port}{GET_TASK_ENDPOINT}\n\
                 - Report status: http://<your-ip>:{port}{REPORT_STATUS_ENDPOINT}\n\
                 - User identifier: {operator_id}",
                abbreviate(device_id, 16)
            )
        }
        Err(BindingError::AlreadyBoundByOperator { device_id, .. }) => format!(
            "You are already bound to device {}\nUse /maa unbind before binding a new device",
            abbreviate(&device_id, 8)
        ),
        Err(BindingError::AlreadyBoundByDevice { .. }) => {
            "This device is already bound to another operator".to_string()
        }
        Err(error) => {
            tracing::error!(operator = %operator_id, "bind failed: {error}");
            format!("Binding failed: {error}")
        }
    }
}

fn execute_unbind(runtime: &DispatchRuntime, operator_id: &str) -> String {
    match runtime.unbind_operator(operator_id) {
        Ok(device_id) => format!("Unbound device: {}", abbreviate(&device_id, 16)),
        Err(BindingError::NotBound { .. }) => "You have no bound device".to_string(),
        Err(error) => {
            tracing::error!(operator = %operator_id, "unbind failed: {error}");
            format!("Unbinding failed: {error}")
        }
    }
}

fn execute_status(runtime: &DispatchRuntime, operator_id: &str) -> String {
    let Some(report) = runtime.device_status(operator_id, current_unix_timestamp_ms()) else {
        return "You have no bound device\nUse /maa bind <deviceId> to bind one".to_string();
    };
    format!(
        "MAA device status\n\nDevice ID: {}\nStatus: {}\nPending tasks: {}",
        abbreviate(&report.device_id, 16),
        report.presence.describe(),
        report.queued_tasks
    )
}

fn execute_start(runtime: &DispatchRuntime, operator_id: &str, tasks: &str) -> String {
    if runtime.binding_for_operator(operator_id).is_none() {
        return BIND_FIRST_MESSAGE.to_string();
    }
    let names = tasks
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>();
    if names.is_empty() {
        return START_USAGE_MESSAGE.to_string();
    }

    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        let Some(task_type) = resolve_task_alias(name) else {
            return format!(
                "Unknown task: {name}\n\nAvailable tasks:\n{}",
                render_available_tasks()
            );
        };
        resolved.push((name, task_type));
    }

    let mut lines = Vec::with_capacity(resolved.len());
    for (name, task_type) in resolved {
        match runtime.enqueue_for_operator(operator_id, task_type, None, TaskPriority::Normal) {
            Ok(_) => lines.push(format!("- {name} ({task_type})")),
            Err(error) => {
                tracing::warn!(operator = %operator_id, "enqueue failed: {error}");
                return BIND_FIRST_MESSAGE.to_string();
            }
        }
    }
    format!(
        "Queued {} task(s)\n\n{}\n\nMAA will run them on its next poll",
        lines.len(),
        lines.join("\n")
    )
}

fn execute_head_task(
    runtime: &DispatchRuntime,
    operator_id: &str,
    task_type: &str,
    confirmation: &str,
) -> String {
    match runtime.enqueue_for_operator(operator_id, task_type, None, TaskPriority::Head) {
        Ok(_) => confirmation.to_string(),
        Err(_) => BIND_FIRST_MESSAGE.to_string(),
    }
}
