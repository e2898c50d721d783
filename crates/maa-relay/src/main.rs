mod bootstrap_helpers;
mod cli_args;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use maa_commands::{build_command_router, CommandServerState, OperatorCommandContext};
use maa_dispatch::{build_dispatch_router, DispatchServerState, DispatchService};

use crate::bootstrap_helpers::{build_notification_channel, init_tracing};
use crate::cli_args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.dispatch_service_config();
    let channel = build_notification_channel(&cli)?;

    let state = DispatchServerState::load(&config, channel);
    let mut router = build_dispatch_router(state.clone());
    if cli.operator_commands {
        router = router.merge(build_command_router(CommandServerState::new(
            Arc::clone(state.runtime()),
            OperatorCommandContext {
                http_port: config.port,
            },
        )));
    }

    let mut service = DispatchService::start_with_router(&config, state, router).await;
    if !service.is_serving() {
        tracing::warn!("device endpoints unavailable; running without a listener");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for ctrl-c")?;
    tracing::info!("shutdown requested");
    service.shutdown().await;
    Ok(())
}
