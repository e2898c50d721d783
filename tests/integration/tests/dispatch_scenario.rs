use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use maa_commands::{
    build_command_router, CommandServerState, OperatorCommandContext, OperatorCommandResponse,
    COMMAND_ENDPOINT,
};
use maa_dispatch::{
    build_dispatch_router, DispatchServerState, DispatchService, DispatchServiceConfig,
    GetTaskResponse, NotificationChannel, OutboundNotification, TaskQueuePolicy,
    WebhookNotificationChannel, CAPTURE_IMAGE_TASK_TYPE, GET_TASK_ENDPOINT,
    REPORT_STATUS_ENDPOINT,
};
use reqwest::Client;
use serde_json::{json, Value};

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<(OutboundNotification, bool)>>,
}

impl RecordingChannel {
    fn sent(&self) -> Vec<(OutboundNotification, bool)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    async fn wait_for(&self, expected: usize) -> Vec<(OutboundNotification, bool)> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= expected {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, notification: &OutboundNotification) -> Result<()> {
        let image_on_disk = notification
            .image_path
            .as_deref()
            .is_some_and(|path| path.exists());
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((notification.clone(), image_on_disk));
        }
        Ok(())
    }
}

fn service_config(data_dir: &Path) -> DispatchServiceConfig {
    DispatchServiceConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        data_dir: data_dir.to_path_buf(),
        task_policy: TaskQueuePolicy::default(),
        media_release_delay: Duration::from_millis(100),
    }
}

async fn start_relay(
    config: &DispatchServiceConfig,
    channel: Arc<dyn NotificationChannel>,
) -> Result<(DispatchService, String)> {
    let state = DispatchServerState::load(config, channel);
    let router = build_dispatch_router(state.clone()).merge(build_command_router(
        CommandServerState::new(
            Arc::clone(state.runtime()),
            OperatorCommandContext { http_port: 2828 },
        ),
    ));
    let service = DispatchService::start_with_router(config, state, router).await;
    let addr = service.local_addr().context("relay should be serving")?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    Ok((service, format!("http://{addr}")))
}

async fn operator_command(
    client: &Client,
    base: &str,
    operator: &str,
    text: &str,
) -> Result<Vec<String>> {
    let response = client
        .post(format!("{base}{COMMAND_ENDPOINT}"))
        .json(&json!({"operator": operator, "channel": format!("chan-{operator}"), "text": text}))
        .send()
        .await?
        .error_for_status()?
        .json::<OperatorCommandResponse>()
        .await?;
    Ok(response.messages)
}

async fn get_tasks(client: &Client, base: &str, device: &str) -> Result<GetTaskResponse> {
    Ok(client
        .post(format!("{base}{GET_TASK_ENDPOINT}"))
        .json(&json!({"device": device, "user": "u1"}))
        .send()
        .await?
        .error_for_status()?
        .json::<GetTaskResponse>()
        .await?)
}

async fn report_status(
    client: &Client,
    base: &str,
    device: &str,
    task: &str,
    payload: Option<&str>,
) -> Result<reqwest::StatusCode> {
    let mut body = json!({"device": device, "task": task, "status": "done"});
    if let Some(payload) = payload {
        body["payload"] = Value::String(payload.to_string());
    }
    Ok(client
        .post(format!("{base}{REPORT_STATUS_ENDPOINT}"))
        .json(&body)
        .send()
        .await?
        .status())
}

fn media_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn integration_operator_device_round_trip_with_screenshot() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let config = service_config(temp.path());
    let channel = Arc::new(RecordingChannel::default());
    let (mut service, base) = start_relay(&config, channel.clone()).await?;
    let client = Client::new();

    let bind = operator_command(&client, &base, "u1", "/maa bind D1").await?;
    assert!(bind[0].starts_with("Device bound."));
    let start = operator_command(&client, &base, "u1", "/maa start Combat").await?;
    assert!(start[0].contains("Combat (LinkStart-Combat)"));

    let first = get_tasks(&client, &base, "D1").await?;
    let types = first
        .tasks
        .iter()
        .map(|task| task.task_type.as_str())
        .collect::<Vec<_>>();
    assert_eq!(types, vec!["LinkStart-Combat", CAPTURE_IMAGE_TASK_TYPE]);
    assert_eq!(get_tasks(&client, &base, "D1").await?, first);

    let combat_id = first.tasks[0].id.clone();
    let capture_id = first.tasks[1].id.clone();
    assert_eq!(
        report_status(&client, &base, "D1", &combat_id, None).await?,
        reqwest::StatusCode::OK
    );
    let remaining = get_tasks(&client, &base, "D1").await?;
    assert_eq!(remaining.tasks.len(), 1);
    assert_eq!(remaining.tasks[0].id, capture_id);

    let sent = channel.wait_for(1).await;
    assert_eq!(sent[0].0.destination, "chan-u1");
    assert_eq!(sent[0].0.text, "MAA task completed\nstatus: done");
    assert!(sent[0].0.image_path.is_none());

    let image = STANDARD.encode(vec![0x89_u8; 1024]);
    assert_eq!(
        report_status(&client, &base, "D1", &capture_id, Some(image.as_str())).await?,
        reqwest::StatusCode::OK
    );
    assert!(get_tasks(&client, &base, "D1").await?.tasks.is_empty());

    let sent = channel.wait_for(2).await;
    assert_eq!(sent.len(), 2);
    let image_path = sent[1].0.image_path.clone().context("image notification")?;
    assert!(sent[1].1, "screenshot exists while it is being sent");

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!image_path.exists());
    assert!(media_files(&temp.path().join("temp")).is_empty());

    // A late duplicate report for an acknowledged task changes nothing.
    assert_eq!(
        report_status(&client, &base, "D1", &combat_id, None).await?,
        reqwest::StatusCode::OK
    );
    assert!(get_tasks(&client, &base, "D1").await?.tasks.is_empty());

    service.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn integration_bindings_survive_restart_but_queues_do_not() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let config = service_config(temp.path());
    let client = Client::new();

    let (mut service, base) = start_relay(&config, Arc::new(RecordingChannel::default())).await?;
    operator_command(&client, &base, "u1", "bind D1").await?;
    operator_command(&client, &base, "u1", "start mall").await?;
    assert_eq!(get_tasks(&client, &base, "D1").await?.tasks.len(), 2);
    service.shutdown().await;

    let persisted = std::fs::read_to_string(temp.path().join("bindings.json"))?;
    let persisted = serde_json::from_str::<Value>(&persisted)?;
    assert_eq!(persisted["schema_version"], 1);
    assert_eq!(persisted["bindings"]["u1"]["device_id"], "D1");
    assert_eq!(persisted["bindings"]["u1"]["channel"], "chan-u1");

    let (mut service, base) = start_relay(&config, Arc::new(RecordingChannel::default())).await?;
    assert_eq!(
        service.state().runtime().operator_for_device("D1").as_deref(),
        Some("u1")
    );
    assert!(get_tasks(&client, &base, "D1").await?.tasks.is_empty());
    let reply = operator_command(&client, &base, "u2", "bind D1").await?;
    assert_eq!(reply[0], "This device is already bound to another operator");
    service.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn integration_unbind_then_rebind_isolates_previous_operator() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let config = service_config(temp.path());
    let channel = Arc::new(RecordingChannel::default());
    let (mut service, base) = start_relay(&config, channel.clone()).await?;
    let client = Client::new();

    operator_command(&client, &base, "u1", "bind D1").await?;
    operator_command(&client, &base, "u1", "start combat").await?;
    let stale = get_tasks(&client, &base, "D1").await?;
    assert_eq!(stale.tasks.len(), 2);

    operator_command(&client, &base, "u1", "unbind").await?;
    operator_command(&client, &base, "u2", "bind D1").await?;
    assert!(get_tasks(&client, &base, "D1").await?.tasks.is_empty());

    report_status(&client, &base, "D1", &stale.tasks[0].id, None).await?;
    let sent = channel.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.destination, "chan-u2");

    let status = operator_command(&client, &base, "u1", "status").await?;
    assert!(status[0].starts_with("You have no bound device"));

    service.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn integration_webhook_channel_receives_text_and_image() -> Result<()> {
    let webhook = httpmock::MockServer::start_async().await;
    let text_mock = webhook
        .mock_async(|when, then| {
            when.method(httpmock::Method::POST)
                .path("/notify")
                .body_includes("\"destination\":\"chan-u1\"")
                .body_includes("status: SUCCESS");
            then.status(200);
        })
        .await;

    let temp = tempfile::tempdir()?;
    let config = service_config(temp.path());
    let channel = Arc::new(WebhookNotificationChannel::new(webhook.url("/notify"), 2_000)?);
    let (mut service, base) = start_relay(&config, channel).await?;
    let client = Client::new();

    operator_command(&client, &base, "u1", "bind D1").await?;
    operator_command(&client, &base, "u1", "ss").await?;
    let tasks = get_tasks(&client, &base, "D1").await?;
    assert_eq!(tasks.tasks.len(), 1);
    assert_eq!(tasks.tasks[0].task_type, "CaptureImageNow");

    let client = Client::new();
    let image = STANDARD.encode(vec![0x10_u8; 512]);
    let status = client
        .post(format!("{base}{REPORT_STATUS_ENDPOINT}"))
        .json(&json!({
            "device": "D1",
            "task": tasks.tasks[0].id,
            "status": "SUCCESS",
            "payload": image,
        }))
        .send()
        .await?
        .status();
    assert_eq!(status, reqwest::StatusCode::OK);

    for _ in 0..100 {
        if text_mock.calls_async().await >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    text_mock.assert_async().await;

    service.shutdown().await;
    Ok(())
}
