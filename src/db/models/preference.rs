// Notification Preference Model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// A user's notification channel
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationPreference {
    pub id: i64,
    pub user_id: String,
    pub channel: String,
    pub recipient: String,
    pub enabled: bool,
}

impl NotificationPreference {
    /// Parsed channel kind, `None` for channels this build does not know
    pub fn channel_kind(&self) -> Option<ChannelKind> {
        self.channel.parse().ok()
    }
}

/// Supported notification channel kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    /// Slack or any webhook accepting `{"text": ...}`
    Slack,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Email => write!(f, "email"),
            ChannelKind::Slack => write!(f, "slack"),
        }
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(ChannelKind::Email),
            "slack" | "webhook" => Ok(ChannelKind::Slack),
            other => Err(format!("unknown notification channel: {}", other)),
        }
    }
}
