//! Notification sink seam.
//!
//! The ledger never delivers notifications itself; it hands them to a sink
//! after a unit commits. Delivery is best-effort: a failed notification is
//! logged and swallowed, never surfaced as a financial failure.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Delivery channels a notification may fan out to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    InApp,
    Sms,
    Whatsapp,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    Transaction,
    Goal,
    System,
}

/// One notification addressed to a user
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub channels: Vec<NotificationChannel>,
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// External collaborator that actually delivers notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Dev-mode sink that writes notifications to the log
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            user_id = %notification.user_id,
            title = %notification.title,
            message = %notification.message,
            "notification"
        );
        Ok(())
    }
}

/// Sink that POSTs notifications to a downstream dispatch service
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "dispatch service returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Fire-and-forget dispatch. Runs strictly after the financial unit has
/// committed; failure is logged and swallowed.
pub async fn dispatch(sink: &dyn NotificationSink, notification: Notification) {
    if let Err(e) = sink.deliver(&notification).await {
        warn!(
            user_id = %notification.user_id,
            title = %notification.title,
            error = %e,
            "notification delivery failed"
        );
    }
}
