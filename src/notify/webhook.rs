// Webhook Notifier - Slack-compatible incoming webhooks

use crate::notify::{Message, Notifier};
use crate::{InspectError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Posts `{"text": body}` to the webhook URL in `Message::to`
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create new webhook notifier
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Format message as webhook payload
    fn format_payload(message: &Message) -> serde_json::Value {
        json!({ "text": message.body })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &Message) -> Result<()> {
        let payload = Self::format_payload(message);

        let response = self.client.post(&message.to).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(InspectError::notification(
                self.channel_name(),
                format!("webhook returned status {}: {}", status, body),
            ));
        }

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "slack"
    }
}
