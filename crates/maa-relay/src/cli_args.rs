use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use maa_dispatch::{DispatchServiceConfig, TaskQueuePolicy};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "maa-relay",
    about = "Task dispatch relay between chat operators and MAA devices",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long = "http-host",
        env = "MAA_RELAY_HTTP_HOST",
        default_value = "0.0.0.0",
        help = "Interface the device endpoints listen on"
    )]
    pub(crate) http_host: String,

    #[arg(
        long = "http-port",
        env = "MAA_RELAY_HTTP_PORT",
        default_value_t = 2828,
        help = "Port for /maa/getTask and /maa/reportStatus"
    )]
    pub(crate) http_port: u16,

    #[arg(
        long = "data-dir",
        env = "MAA_RELAY_DATA_DIR",
        default_value = "data/maa-relay",
        help = "Directory holding bindings.json and staged screenshots"
    )]
    pub(crate) data_dir: PathBuf,

    #[arg(
        long = "auto-screenshot",
        env = "MAA_RELAY_AUTO_SCREENSHOT",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Queue a CaptureImage task after every non-exempt task"
    )]
    pub(crate) auto_screenshot: bool,

    #[arg(
        long = "media-release-delay-seconds",
        env = "MAA_RELAY_MEDIA_RELEASE_DELAY_SECONDS",
        default_value_t = 30,
        value_parser = parse_positive_u64,
        help = "Seconds a staged screenshot is kept after it was sent"
    )]
    pub(crate) media_release_delay_seconds: u64,

    #[arg(
        long = "notify-webhook-url",
        env = "MAA_RELAY_NOTIFY_WEBHOOK_URL",
        help = "Deliver task results to this webhook instead of the service log"
    )]
    pub(crate) notify_webhook_url: Option<String>,

    #[arg(
        long = "notify-webhook-timeout-ms",
        env = "MAA_RELAY_NOTIFY_WEBHOOK_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Request timeout for webhook deliveries"
    )]
    pub(crate) notify_webhook_timeout_ms: u64,

    #[arg(
        long = "operator-commands",
        env = "MAA_RELAY_OPERATOR_COMMANDS",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Expose POST /maa/command on the device listener"
    )]
    pub(crate) operator_commands: bool,
}

impl Cli {
    pub(crate) fn dispatch_service_config(&self) -> DispatchServiceConfig {
        DispatchServiceConfig {
            host: self.http_host.clone(),
            port: self.http_port,
            data_dir: self.data_dir.clone(),
            task_policy: TaskQueuePolicy {
                auto_screenshot: self.auto_screenshot,
            },
            media_release_delay: Duration::from_secs(self.media_release_delay_seconds),
        }
    }
}
