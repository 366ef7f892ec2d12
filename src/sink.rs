//! Webhook delivery.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Serialize;

use crate::filter::{Classified, MessageType};

/// Fixed source tag stamped on every outbound payload.
const SOURCE_TAG: &str = "ncbridge";

/// Connection timeout for the webhook client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound wire payload.
#[derive(Debug, Serialize)]
pub struct OutboundMessage {
    pub sender: String,
    pub channel: String,
    pub message: String,
    /// RFC 3339 UTC, or null when the record carried no date.
    pub timestamp: Option<String>,
    pub message_type: MessageType,
    pub subtitle: String,
    pub source: &'static str,
    pub truncated: bool,
}

impl OutboundMessage {
    /// Build the wire payload for a classified notification.
    #[must_use]
    pub fn from_classified(classified: &Classified) -> Self {
        let n = &classified.notification;
        Self {
            sender: n.title.clone(),
            channel: n.subtitle.clone(),
            message: n.body.clone(),
            timestamp: rfc3339_utc(n.timestamp),
            message_type: classified.message_type,
            subtitle: n.subtitle.clone(),
            source: SOURCE_TAG,
            truncated: classified.truncated,
        }
    }
}

/// RFC 3339 UTC string for a Unix timestamp, `None` for the zero value.
fn rfc3339_utc(timestamp: i64) -> Option<String> {
    if timestamp == 0 {
        return None;
    }
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.to_rfc3339())
}

/// Delivery seam for the capture loop.
#[async_trait]
pub trait Deliver: Send + Sync {
    /// Attempt delivery of one classified notification. Never
    /// propagates: `false` means the notification is dropped for good.
    async fn deliver(&self, message: &Classified) -> bool;
}

/// Fire-and-forget webhook sink.
///
/// One POST per notification with a bounded timeout. There is no retry
/// and no queue: the cursor-advancement policy treats a failed delivery
/// as a permanent drop, and a retry layer here would silently turn that
/// into redelivery.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    url: String,
    timeout: Duration,
    dry_run: bool,
}

impl WebhookSink {
    /// Build a sink for `url` with the given per-request timeout.
    #[must_use]
    pub fn new(url: String, timeout: Duration, dry_run: bool) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            url,
            timeout,
            dry_run,
        }
    }

    /// Whether this sink logs payloads instead of POSTing them.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[async_trait]
impl Deliver for WebhookSink {
    async fn deliver(&self, message: &Classified) -> bool {
        let rec_id = message.notification.rec_id;
        let payload = OutboundMessage::from_classified(message);

        if self.dry_run {
            let body =
                serde_json::to_string(&payload).unwrap_or_else(|_| "<unserializable>".to_string());
            tracing::info!(rec_id, payload = %body, "dry run, skipping delivery");
            return true;
        }

        let response = self.client.post(&self.url).json(&payload).send().await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(rec_id, "delivered");
                true
            }
            Ok(resp) => {
                tracing::warn!(
                    rec_id,
                    status = %resp.status(),
                    url = %self.url,
                    "webhook rejected notification, dropping"
                );
                false
            }
            Err(err) if err.is_timeout() => {
                tracing::warn!(
                    rec_id,
                    timeout_secs = self.timeout.as_secs(),
                    url = %self.url,
                    "webhook request timed out, dropping"
                );
                false
            }
            Err(err) => {
                tracing::warn!(
                    rec_id,
                    url = %self.url,
                    error = %err,
                    "webhook request failed, dropping"
                );
                false
            }
        }
    }
}
