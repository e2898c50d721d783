//! HTTP mailbox the device polls: task fetch and result report.
//!
//! No task runs on the server. `POST /maa/getTask` hands out every
//! unacknowledged task for the device (at-least-once), and
//! `POST /maa/reportStatus` acknowledges one task and relays the result to
//! the bound operator's channel without waiting for delivery.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use maa_core::current_unix_timestamp_ms;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::binding_registry::{BindingRegistry, BINDINGS_FILE_NAME};
use crate::dispatch_runtime::{DispatchRuntime, FetchOutcome};
use crate::notification_channel::NotificationChannel;
use crate::notification_relay::{NotificationRelay, NotificationRelayConfig};
use crate::task_queue::TaskQueuePolicy;

mod endpoints;
mod handlers;
mod server_bootstrap;
mod types;

pub use endpoints::{GET_TASK_ENDPOINT, REPORT_STATUS_ENDPOINT};
pub use server_bootstrap::{build_dispatch_router, start_dispatch_server, DispatchServerHandle};
pub use types::{
    parse_get_task_request, parse_report_status_request, DispatchEndpoint, DispatchProtocolError,
    GetTaskRequest, GetTaskResponse, ReportStatusRequest,
};

use endpoints::IMAGE_PAYLOAD_MIN_CHARS;
use handlers::{handle_get_task, handle_report_status};

#[derive(Debug, Clone)]
/// Settings for the dispatch service: listener address, data directory and queue policy.
pub struct DispatchServiceConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub task_policy: TaskQueuePolicy,
    pub media_release_delay: Duration,
}

#[derive(Clone)]
/// Shared state injected into the dispatch handlers.
pub struct DispatchServerState {
    runtime: Arc<DispatchRuntime>,
    relay: Arc<NotificationRelay>,
}

impl DispatchServerState {
    pub fn new(runtime: Arc<DispatchRuntime>, relay: Arc<NotificationRelay>) -> Self {
        Self { runtime, relay }
    }

    /// Builds the runtime from the persisted bindings under `config.data_dir`.
    pub fn load(config: &DispatchServiceConfig, channel: Arc<dyn NotificationChannel>) -> Self {
        let registry = BindingRegistry::open_or_empty(&config.data_dir.join(BINDINGS_FILE_NAME));
        let runtime = Arc::new(DispatchRuntime::new(registry, config.task_policy));
        let mut relay_config = NotificationRelayConfig::for_data_dir(&config.data_dir);
        relay_config.release_delay = config.media_release_delay;
        let relay = Arc::new(NotificationRelay::new(relay_config, channel));
        Self { runtime, relay }
    }

    pub fn runtime(&self) -> &Arc<DispatchRuntime> {
        &self.runtime
    }

    pub fn relay(&self) -> &Arc<NotificationRelay> {
        &self.relay
    }
}

/// Loaded state plus the listener serving it.
pub struct DispatchService {
    state: DispatchServerState,
    server: DispatchServerHandle,
}

impl DispatchService {
    /// Loads bindings from `config.data_dir` and serves the device endpoints.
    pub async fn start(
        config: &DispatchServiceConfig,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        let state = DispatchServerState::load(config, channel);
        let router = build_dispatch_router(state.clone());
        Self::start_with_router(config, state, router).await
    }

    /// Serves `router`, which must already include the device endpoints for `state`.
    pub async fn start_with_router(
        config: &DispatchServiceConfig,
        state: DispatchServerState,
        router: Router,
    ) -> Self {
        let server = start_dispatch_server(&config.host, config.port, router).await;
        Self { state, server }
    }

    pub fn state(&self) -> &DispatchServerState {
        &self.state
    }

    pub fn is_serving(&self) -> bool {
        self.server.is_serving()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr()
    }

    /// Stops the listener and aborts pending media releases.
    pub async fn shutdown(&mut self) {
        self.server.shutdown().await;
        self.state.relay.shutdown();
        tracing::info!("dispatch service stopped");
    }
}

/// Text sent to the operator when a task result comes in.
pub fn render_task_result_message(status: &str) -> String {
    format!("MAA task completed\nstatus: {status}")
}

/// Returns the payload when it is long enough to be treated as an image.
///
/// Short payloads are status strings; the device sends no explicit content type.
pub fn image_payload(payload: Option<&str>) -> Option<&str> {
    payload.filter(|value| value.chars().count() > IMAGE_PAYLOAD_MIN_CHARS)
}
