//! Push delivery
//!
//! A [`PushTransport`] sends one message to one device token. The
//! [`PushDispatcher`] fans a notification out to every device of its user,
//! prunes tokens the transport reports as invalid, and marks the
//! notification delivered once any send succeeds.
//!
//! Transports:
//! - `LogTransport`: writes to the log only (default)
//! - `WebhookTransport`: POSTs JSON to `FINCH_PUSH_WEBHOOK_URL`
//! - `MockTransport`: records sends, for tests

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Channel, Notification};

/// Environment variable selecting the webhook transport
pub const PUSH_WEBHOOK_ENV: &str = "FINCH_PUSH_WEBHOOK_URL";

/// Message for a single device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    pub fn for_notification(notification: &Notification, token: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert("notification_id".to_string(), notification.id.clone());
        data.insert(
            "category".to_string(),
            notification.category.as_str().to_string(),
        );
        data.insert(
            "priority".to_string(),
            notification.priority.as_str().to_string(),
        );
        Self {
            token: token.to_string(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            data,
        }
    }
}

/// What the transport made of a send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    Sent,
    /// The token is unknown to the push service and should be dropped
    InvalidToken,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, message: &PushMessage) -> Result<PushStatus>;

    fn name(&self) -> &'static str;
}

/// Logs messages instead of sending them
pub struct LogTransport;

#[async_trait]
impl PushTransport for LogTransport {
    async fn send(&self, message: &PushMessage) -> Result<PushStatus> {
        info!(title = %message.title, "Push (log only)");
        Ok(PushStatus::Sent)
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// POSTs `{token, title, body, data}` to a gateway URL
pub struct WebhookTransport {
    client: Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl PushTransport for WebhookTransport {
    async fn send(&self, message: &PushMessage) -> Result<PushStatus> {
        let response = self.client.post(&self.url).json(message).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(PushStatus::InvalidToken),
            status if status.is_success() => Ok(PushStatus::Sent),
            status => Err(Error::Delivery(format!(
                "Push gateway returned {}",
                status
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Records every message; listed tokens are reported invalid
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<PushMessage>>,
    invalid: HashSet<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invalid_tokens(tokens: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            invalid: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Messages accepted so far
    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PushTransport for MockTransport {
    async fn send(&self, message: &PushMessage) -> Result<PushStatus> {
        if self.invalid.contains(&message.token) {
            return Ok(PushStatus::InvalidToken);
        }
        self.sent
            .lock()
            .map_err(|_| Error::Delivery("Mock transport lock poisoned".into()))?
            .push(message.clone());
        Ok(PushStatus::Sent)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Summary of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub sent: usize,
    pub invalid_tokens_removed: usize,
    pub failed: usize,
}

/// Fans notifications out to a user's devices
#[derive(Clone)]
pub struct PushDispatcher {
    db: Database,
    transport: Arc<dyn PushTransport>,
}

impl PushDispatcher {
    pub fn new(db: Database, transport: Arc<dyn PushTransport>) -> Self {
        Self { db, transport }
    }

    /// Webhook transport when `FINCH_PUSH_WEBHOOK_URL` is set, else log-only
    pub fn from_env(db: Database) -> Self {
        let transport: Arc<dyn PushTransport> = match std::env::var(PUSH_WEBHOOK_ENV) {
            Ok(url) if !url.trim().is_empty() => Arc::new(WebhookTransport::new(url.trim())),
            _ => Arc::new(LogTransport),
        };
        Self::new(db, transport)
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Urgent notifications that asked for the push channel
    pub fn should_push(notification: &Notification) -> bool {
        notification.priority.is_urgent() && notification.channels.contains(&Channel::Push)
    }

    /// Send to every registered device of the notification's user
    pub async fn deliver(&self, notification: &Notification) -> Result<DeliveryReport> {
        let devices = self.db.list_devices(&notification.user_id)?;
        let mut report = DeliveryReport::default();

        for device in &devices {
            let message = PushMessage::for_notification(notification, &device.token);
            match self.transport.send(&message).await {
                Ok(PushStatus::Sent) => report.sent += 1,
                Ok(PushStatus::InvalidToken) => {
                    debug!(platform = %device.platform, "Removing invalid push token");
                    self.db.remove_device_token(&device.token)?;
                    report.invalid_tokens_removed += 1;
                }
                Err(e) => {
                    warn!(
                        transport = self.transport.name(),
                        error = %e,
                        "Push send failed"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.sent > 0 {
            self.db.mark_notification_delivered(&notification.id)?;
        }

        debug!(
            notification = %notification.id,
            sent = report.sent,
            failed = report.failed,
            "Push delivery finished"
        );
        Ok(report)
    }
}
