//! Outbound message channels used by the notification relay.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One message addressed to an operator's channel, optionally with an image file.
pub struct OutboundNotification {
    pub destination: String,
    pub text: String,
    pub image_path: Option<PathBuf>,
}

impl OutboundNotification {
    pub fn text(destination: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            text: text.into(),
            image_path: None,
        }
    }

    pub fn with_image(mut self, image_path: PathBuf) -> Self {
        self.image_path = Some(image_path);
        self
    }
}

/// Trait contract for delivering notifications to an operator channel.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, notification: &OutboundNotification) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
/// Channel that only records notifications in the service log.
pub struct TracingNotificationChannel;

#[async_trait]
impl NotificationChannel for TracingNotificationChannel {
    async fn send(&self, notification: &OutboundNotification) -> Result<()> {
        tracing::info!(
            destination = %notification.destination,
            image = ?notification.image_path,
            "notification: {}",
            notification.text
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookNotificationPayload<'a> {
    destination: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_base64: Option<String>,
}

#[derive(Debug, Clone)]
/// Channel that POSTs each notification as JSON to a webhook endpoint.
pub struct WebhookNotificationChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotificationChannel {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            bail!("notification webhook url cannot be empty");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms.max(1)))
            .build()
            .context("failed to build notification webhook client")?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl NotificationChannel for WebhookNotificationChannel {
    async fn send(&self, notification: &OutboundNotification) -> Result<()> {
        let image_base64 = match notification.image_path.as_deref() {
            Some(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("failed to read image {}", path.display()))?;
                Some(STANDARD.encode(bytes))
            }
            None => None,
        };
        let payload = WebhookNotificationPayload {
            destination: notification.destination.as_str(),
            text: notification.text.as_str(),
            image_base64,
        };
        let response = self
            .client
            .post(self.url.as_str())
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("failed to reach notification webhook {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            bail!(
                "notification webhook {} returned status {}",
                self.url,
                status.as_u16()
            );
        }
        Ok(())
    }
}
