//! Relays task results to operator channels, staging screenshots as
//! short-lived temporary files.
//!
//! Every staged file gets a release timer owned by the relay. Releases are
//! best effort: an already-removed file is fine and failures are only logged.
//! [`NotificationRelay::shutdown`] abandons pending releases.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use maa_core::remove_file_if_present;
use thiserror::Error;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::notification_channel::{NotificationChannel, OutboundNotification};

pub const DEFAULT_MEDIA_RELEASE_DELAY: Duration = Duration::from_secs(30);
pub const MEDIA_DIR_NAME: &str = "temp";

#[derive(Debug, Clone)]
pub struct NotificationRelayConfig {
    pub media_dir: PathBuf,
    pub release_delay: Duration,
}

impl NotificationRelayConfig {
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            media_dir: data_dir.join(MEDIA_DIR_NAME),
            release_delay: DEFAULT_MEDIA_RELEASE_DELAY,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayMediaError {
    #[error("invalid base64 image payload: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("failed to stage image {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Delivered { with_image: bool },
    /// The image could not be staged or sent; the annotated text went out instead.
    DeliveredTextFallback { reason: String },
    Failed { reason: String },
}

pub struct NotificationRelay {
    config: NotificationRelayConfig,
    channel: Arc<dyn NotificationChannel>,
    releases: Mutex<JoinSet<()>>,
}

impl NotificationRelay {
    pub fn new(config: NotificationRelayConfig, channel: Arc<dyn NotificationChannel>) -> Self {
        Self {
            config,
            channel,
            releases: Mutex::new(JoinSet::new()),
        }
    }

    pub fn config(&self) -> &NotificationRelayConfig {
        &self.config
    }

    /// Sends `text` to `destination`, attaching the decoded image when present.
    pub async fn notify(
        &self,
        destination: &str,
        text: &str,
        image_base64: Option<&str>,
    ) -> NotificationOutcome {
        let Some(image_base64) = image_base64 else {
            return self
                .send_text(destination, text)
                .await
                .map_or_else(
                    |reason| NotificationOutcome::Failed { reason },
                    |()| NotificationOutcome::Delivered { with_image: false },
                );
        };

        let image_path = match self.stage_image(image_base64).await {
            Ok(path) => path,
            Err(error) => {
                tracing::warn!(destination, "screenshot staging failed: {error}");
                return self.send_fallback(destination, text, error.to_string()).await;
            }
        };

        let notification =
            OutboundNotification::text(destination, text).with_image(image_path.clone());
        let send_result = self.channel.send(&notification).await;
        self.schedule_release(image_path);

        match send_result {
            Ok(()) => NotificationOutcome::Delivered { with_image: true },
            Err(error) => {
                tracing::warn!(destination, "screenshot delivery failed: {error:#}");
                self.send_fallback(destination, text, format!("{error:#}"))
                    .await
            }
        }
    }

    /// Fire-and-forget variant of [`NotificationRelay::notify`].
    pub fn notify_in_background(
        self: &Arc<Self>,
        destination: String,
        text: String,
        image_base64: Option<String>,
    ) {
        let relay = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = relay
                .notify(destination.as_str(), text.as_str(), image_base64.as_deref())
                .await;
            tracing::debug!(destination = %destination, ?outcome, "notification relayed");
        });
    }

    /// Number of staged files whose release has not run yet.
    pub fn pending_releases(&self) -> usize {
        let mut releases = self.releases.lock().unwrap_or_else(PoisonError::into_inner);
        while releases.try_join_next().is_some() {}
        releases.len()
    }

    /// Aborts pending releases; their files are left for the next run's cleanup.
    pub fn shutdown(&self) {
        let mut releases = self.releases.lock().unwrap_or_else(PoisonError::into_inner);
        releases.abort_all();
    }

    async fn stage_image(&self, image_base64: &str) -> Result<PathBuf, RelayMediaError> {
        let bytes = STANDARD.decode(image_base64.trim())?;
        let file_name = format!("screenshot_{}.png", &Uuid::new_v4().simple().to_string()[..8]);
        let path = self.config.media_dir.join(file_name);
        if let Err(error) = self.write_staged(&path, bytes).await {
            // A failed write may leave a partial file behind.
            self.schedule_release(path);
            return Err(error);
        }
        Ok(path)
    }

    async fn write_staged(&self, path: &Path, bytes: Vec<u8>) -> Result<(), RelayMediaError> {
        tokio::fs::create_dir_all(&self.config.media_dir)
            .await
            .map_err(|source| RelayMediaError::Write {
                path: self.config.media_dir.clone(),
                source,
            })?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| RelayMediaError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    fn schedule_release(&self, path: PathBuf) {
        let delay = self.config.release_delay;
        let mut releases = self.releases.lock().unwrap_or_else(PoisonError::into_inner);
        while releases.try_join_next().is_some() {}
        releases.spawn(async move {
            tokio::time::sleep(delay).await;
            match remove_file_if_present(&path) {
                Ok(true) => tracing::debug!(path = %path.display(), "released staged screenshot"),
                Ok(false) => {
                    tracing::debug!(path = %path.display(), "staged screenshot already removed")
                }
                Err(error) => tracing::debug!("failed to release staged screenshot: {error:#}"),
            }
        });
    }

    async fn send_text(&self, destination: &str, text: &str) -> Result<(), String> {
        self.channel
            .send(&OutboundNotification::text(destination, text))
            .await
            .map_err(|error| {
                tracing::warn!(destination, "notification delivery failed: {error:#}");
                format!("{error:#}")
            })
    }

    async fn send_fallback(
        &self,
        destination: &str,
        text: &str,
        reason: String,
    ) -> NotificationOutcome {
        let annotated = format!("{text}\n(screenshot delivery failed: {reason})");
        match self.send_text(destination, annotated.as_str()).await {
            Ok(()) => NotificationOutcome::DeliveredTextFallback { reason },
            Err(reason) => NotificationOutcome::Failed { reason },
        }
    }
}
