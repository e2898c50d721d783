use std::sync::Arc;

use anyhow::Result;
use maa_dispatch::{NotificationChannel, TracingNotificationChannel, WebhookNotificationChannel};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli_args::Cli;

pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

pub(crate) fn build_notification_channel(cli: &Cli) -> Result<Arc<dyn NotificationChannel>> {
    match cli.notify_webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let channel = WebhookNotificationChannel::new(url.trim(), cli.notify_webhook_timeout_ms)?;
            tracing::info!(url = %channel.url(), "delivering notifications by webhook");
            Ok(Arc::new(channel))
        }
        _ => Ok(Arc::new(TracingNotificationChannel)),
    }
}
