//! Operator command front end for the MAA dispatch relay.
//!
//! Parses `/maa ...` text commands, runs them against a
//! [`maa_dispatch::DispatchRuntime`] and renders the replies. The same
//! commands are reachable over HTTP through [`build_command_router`].

pub mod command_handlers;
pub mod command_server;
pub mod operator_command;
pub mod task_aliases;

pub use command_handlers::{
    execute_operator_command, OperatorCommandContext, OperatorCommandRequest,
};
pub use command_server::{
    build_command_router, CommandServerState, OperatorCommandResponse, COMMAND_ENDPOINT,
};
pub use operator_command::{
    parse_operator_command, render_operator_command_help, OperatorCommand,
    OperatorCommandParseError,
};
pub use task_aliases::{render_available_tasks, resolve_task_alias, LINK_START_TASK_TYPE};
