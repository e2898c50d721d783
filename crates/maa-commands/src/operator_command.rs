//! Operator command parsing.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates supported `OperatorCommand` values.
pub enum OperatorCommand {
    Help,
    Bind { device_id: String },
    Unbind,
    Status,
    /// Raw comma-separated task names; resolved when the command runs.
    Start { tasks: String },
    LinkStart,
    Screenshot,
    Stop,
    Heartbeat,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperatorCommandParseError {
    #[error("empty command")]
    Empty,
    #[error("usage: /maa bind <deviceId>")]
    MissingDeviceId,
    #[error("command '{command}' does not take arguments")]
    UnexpectedArguments { command: String },
    #[error("unknown command '{command}'")]
    Unknown { command: String },
}

fn strip_command_prefix(text: &str) -> &str {
    let trimmed = text.trim();
    let Some((head, rest)) = trimmed.split_once(char::is_whitespace) else {
        return if matches!(trimmed.to_ascii_lowercase().as_str(), "/maa" | "maa") {
            ""
        } else {
            trimmed
        };
    };
    if matches!(head.to_ascii_lowercase().as_str(), "/maa" | "maa") {
        rest.trim_start()
    } else {
        trimmed
    }
}

fn expect_no_arguments(
    command: OperatorCommand,
    word: &str,
    remainder: &str,
) -> Result<OperatorCommand, OperatorCommandParseError> {
    if remainder.is_empty() {
        Ok(command)
    } else {
        Err(OperatorCommandParseError::UnexpectedArguments {
            command: word.to_string(),
        })
    }
}

/// Parses operator text such as `/maa start Combat,Mall` or `status`.
///
/// The `/maa ` (or `maa `) prefix is optional and the command word is
/// case-insensitive. A bare prefix parses as [`OperatorCommand::Help`].
pub fn parse_operator_command(text: &str) -> Result<OperatorCommand, OperatorCommandParseError> {
    if text.trim().is_empty() {
        return Err(OperatorCommandParseError::Empty);
    }
    let body = strip_command_prefix(text);
    if body.is_empty() {
        return Ok(OperatorCommand::Help);
    }
    let (word, remainder) = match body.split_once(char::is_whitespace) {
        Some((word, remainder)) => (word, remainder.trim()),
        None => (body, ""),
    };

    let normalized = word.to_ascii_lowercase();
    match normalized.as_str() {
        "help" => expect_no_arguments(OperatorCommand::Help, word, remainder),
        "bind" => {
            let mut tokens = remainder.split_whitespace();
            let Some(device_id) = tokens.next() else {
                return Err(OperatorCommandParseError::MissingDeviceId);
            };
            if tokens.next().is_some() {
                return Err(OperatorCommandParseError::MissingDeviceId);
            }
            Ok(OperatorCommand::Bind {
                device_id: device_id.to_string(),
            })
        }
        "unbind" => expect_no_arguments(OperatorCommand::Unbind, word, remainder),
        "status" => expect_no_arguments(OperatorCommand::Status, word, remainder),
        "start" => Ok(OperatorCommand::Start {
            tasks: remainder.to_string(),
        }),
        "linkstart" => expect_no_arguments(OperatorCommand::LinkStart, word, remainder),
        "screenshot" | "cap" | "ss" => {
            expect_no_arguments(OperatorCommand::Screenshot, word, remainder)
        }
        "stop" => expect_no_arguments(OperatorCommand::Stop, word, remainder),
        "heartbeat" | "ping" => expect_no_arguments(OperatorCommand::Heartbeat, word, remainder),
        _ => Err(OperatorCommandParseError::Unknown {
            command: word.to_string(),
        }),
    }
}

pub fn render_operator_command_help() -> String {
    [
        "supported /maa commands:",
        "- /maa bind <deviceId>",
        "- /maa unbind",
        "- /maa status",
        "- /maa start <task>[,<task>...]",
        "- /maa linkstart",
        "- /maa screenshot (cap, ss)",
        "- /maa stop",
        "- /maa heartbeat (ping)",
    ]
    .join("\n")
}
