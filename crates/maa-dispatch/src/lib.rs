//! Task dispatch relay for MAA devices.
//!
//! Operators bind a device, queue tasks for it, and receive the results the
//! device reports back. The device only ever polls; this crate holds the
//! binding registry, the per-device task queues, presence tracking, the HTTP
//! endpoints the device talks to and the relay that forwards results to the
//! operator's channel.

pub mod binding_registry;
pub mod dispatch_runtime;
pub mod dispatch_server;
pub mod notification_channel;
pub mod notification_relay;
pub mod presence;
pub mod task_queue;

pub use binding_registry::{
    BindingError, BindingRegistry, DeviceBinding, BINDINGS_FILE_NAME, BINDING_SCHEMA_VERSION,
};
pub use dispatch_runtime::{DeviceStatusReport, DispatchRuntime, EnqueuedTask, FetchOutcome};
pub use dispatch_server::{
    build_dispatch_router, image_payload, parse_get_task_request, parse_report_status_request,
    render_task_result_message, start_dispatch_server, DispatchEndpoint, DispatchProtocolError,
    DispatchServerHandle, DispatchServerState, DispatchService, DispatchServiceConfig, GetTaskRequest,
    GetTaskResponse, ReportStatusRequest, GET_TASK_ENDPOINT, REPORT_STATUS_ENDPOINT,
};
pub use notification_channel::{
    NotificationChannel, OutboundNotification, TracingNotificationChannel,
    WebhookNotificationChannel,
};
pub use notification_relay::{
    NotificationOutcome, NotificationRelay, NotificationRelayConfig, RelayMediaError,
    DEFAULT_MEDIA_RELEASE_DELAY, MEDIA_DIR_NAME,
};
pub use presence::{PresenceStatus, PresenceTracker};
pub use task_queue::{
    QueuedTask, TaskPriority, TaskQueuePolicy, TaskQueueStore, AUTO_SCREENSHOT_EXEMPT_TASK_TYPES,
    CAPTURE_IMAGE_NOW_TASK_TYPE, CAPTURE_IMAGE_TASK_TYPE, HEARTBEAT_TASK_TYPE, STOP_TASK_TYPE,
};
