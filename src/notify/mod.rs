// Notification transports
//
// Every channel implements the single `Notifier` contract: deliver one
// `Message` or return an error. Recipients come from the user's notification
// preferences, so a notifier carries transport settings only.

pub mod email;
pub mod templates;
pub mod webhook;

pub use email::EmailNotifier;
pub use templates::{AlertTemplate, EmailTemplates, RenderedEmail};
pub use webhook::WebhookNotifier;

use crate::Result;
use async_trait::async_trait;

/// One outbound notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Email address or webhook URL, depending on the channel
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Message {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Notification channel trait
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message
    async fn notify(&self, message: &Message) -> Result<()>;

    /// Get the channel name for logging
    fn channel_name(&self) -> &str;
}

/// Notifier for a channel that has no configured transport.
///
/// Every delivery fails, so the router logs it like any other failure.
pub struct DisabledNotifier {
    channel: String,
}

impl DisabledNotifier {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, message: &Message) -> Result<()> {
        Err(crate::InspectError::notification(
            &self.channel,
            format!("channel not configured, dropping message to {}", message.to),
        ))
    }

    fn channel_name(&self) -> &str {
        &self.channel
    }
}
