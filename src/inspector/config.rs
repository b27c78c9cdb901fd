// Inspector configuration

use crate::db::DatabaseConfig;
use crate::{InspectError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Upper bound accepted for any configured duration (100 years)
const MAX_DURATION_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

/// Main inspector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectorConfig {
    pub inspector: InspectorSettings,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// Inspection run settings.
///
/// The three durations have no default: a config that omits one is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectorSettings {
    /// Certificates expiring within this window are reported as about to expire
    pub cert_expiry_threshold_seconds: u64,
    /// Dial, handshake and HTTP request timeout
    pub network_timeout_seconds: u64,
    /// Check history older than this is deleted
    pub retention_seconds: u64,
    /// Cap on concurrent probes per checking job
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Capacity of each event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_tls_port")]
    pub tls_port: u16,
}

/// Notification transports
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// SMTP email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub use_tls: bool,
}

/// Webhook (Slack-compatible) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_timeout")]
    pub timeout_seconds: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_webhook_timeout(),
        }
    }
}

fn default_max_workers() -> usize {
    50
}

fn default_event_buffer() -> usize {
    64
}

fn default_tls_port() -> u16 {
    443
}

fn default_webhook_timeout() -> u64 {
    5
}

impl InspectorSettings {
    /// Create settings with the given durations and default tuning
    pub fn new(cert_expiry_threshold: Duration, network_timeout: Duration, retention: Duration) -> Self {
        Self {
            cert_expiry_threshold_seconds: cert_expiry_threshold.as_secs(),
            network_timeout_seconds: network_timeout.as_secs(),
            retention_seconds: retention.as_secs(),
            max_workers: default_max_workers(),
            event_buffer: default_event_buffer(),
            tls_port: default_tls_port(),
        }
    }

    pub fn cert_expiry_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cert_expiry_threshold_seconds as i64)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_seconds)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_seconds as i64)
    }

    /// Reject zero or out-of-range values
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("cert_expiry_threshold_seconds", self.cert_expiry_threshold_seconds),
            ("network_timeout_seconds", self.network_timeout_seconds),
            ("retention_seconds", self.retention_seconds),
        ];

        for (name, value) in durations {
            if value == 0 {
                return Err(InspectError::config(format!("{} must be greater than zero", name)));
            }
            if value > MAX_DURATION_SECONDS {
                return Err(InspectError::config(format!(
                    "{} must be at most {} seconds",
                    name, MAX_DURATION_SECONDS
                )));
            }
        }

        if self.max_workers == 0 {
            return Err(InspectError::config("max_workers must be greater than zero"));
        }
        if self.event_buffer == 0 {
            return Err(InspectError::config("event_buffer must be greater than zero"));
        }

        Ok(())
    }
}

impl InspectorConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            InspectError::config(format!(
                "Failed to read config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: InspectorConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.inspector.validate()?;

        if self.notifications.webhook.timeout_seconds == 0 {
            return Err(InspectError::config(
                "notifications.webhook.timeout_seconds must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)?;

        fs::write(path.as_ref(), toml_str)?;

        Ok(())
    }

    /// Write a commented example configuration
    pub fn create_example<P: AsRef<Path>>(path: P) -> Result<()> {
        fs::write(path.as_ref(), EXAMPLE_CONFIG)?;
        Ok(())
    }

    /// Names of the notification channels that can deliver
    pub fn enabled_channels(&self) -> Vec<String> {
        let mut channels = Vec::new();

        if let Some(ref email) = self.notifications.email
            && email.enabled
        {
            channels.push("email".to_string());
        }

        channels.push("slack".to_string());

        channels
    }
}

const EXAMPLE_CONFIG: &str = r#"[inspector]
# Certificates expiring within this window are reported as AboutToExpire (72h)
cert_expiry_threshold_seconds = 259200
# Timeout for TCP dial, TLS handshake and HTTP requests
network_timeout_seconds = 5
# Check history older than this is deleted on every run (30 days)
retention_seconds = 2592000
# Cap on concurrent probes per checking job
max_workers = 50
event_buffer = 64
tls_port = 443

[database]
# Database type: "postgres" or "sqlite"
type = "sqlite"
path = "./certwatch.db"

# PostgreSQL configuration (uncomment to use)
# type = "postgres"
# host = "localhost"
# port = 5432
# database = "certwatch"
# username = "certwatch"
# password = "secure_password"
# max_connections = 20

[notifications.email]
enabled = false
smtp_server = "smtp.example.com"
smtp_port = 587
from_address = "alerts@example.com"
username = "alerts"
password = "secure_password"
use_tls = true

[notifications.webhook]
timeout_seconds = 5
"#;
