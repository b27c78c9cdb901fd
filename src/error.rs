// Error types for certwatch
//
// Structured error type shared by the inspection core, the repositories and
// the notification transports. Per-target probe failures are never errors:
// they are classified into a status and persisted.

use std::io;
use thiserror::Error;

/// Main error type for certwatch operations
#[derive(Debug, Error)]
pub enum InspectError {
    /// Invalid or incomplete configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(String),

    /// A notifier could not deliver a message
    #[error("Notification via {channel} failed: {details}")]
    Notification { channel: String, details: String },

    /// Template registration or rendering failed
    #[error("Template error: {0}")]
    Template(String),

    /// Generic I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Reqwest HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An inspection run was started more than once
    #[error("Inspection run already started (state: {state})")]
    AlreadyStarted { state: String },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl InspectError {
    /// Shorthand for configuration errors
    pub fn config(message: impl Into<String>) -> Self {
        InspectError::Config {
            message: message.into(),
        }
    }

    /// Shorthand for notification errors
    pub fn notification(channel: impl Into<String>, details: impl Into<String>) -> Self {
        InspectError::Notification {
            channel: channel.into(),
            details: details.into(),
        }
    }
}

/// Conversion from anyhow::Error for the binary boundary
impl From<anyhow::Error> for InspectError {
    fn from(err: anyhow::Error) -> Self {
        InspectError::Other(err.to_string())
    }
}

impl From<toml::de::Error> for InspectError {
    fn from(err: toml::de::Error) -> Self {
        InspectError::config(format!("Failed to parse TOML config: {}", err))
    }
}

impl From<toml::ser::Error> for InspectError {
    fn from(err: toml::ser::Error) -> Self {
        InspectError::config(format!("Failed to serialize config: {}", err))
    }
}

impl From<tokio::task::JoinError> for InspectError {
    fn from(err: tokio::task::JoinError) -> Self {
        InspectError::Other(format!("Task join error: {}", err))
    }
}

impl From<handlebars::RenderError> for InspectError {
    fn from(err: handlebars::RenderError) -> Self {
        InspectError::Template(format!("render failed: {}", err))
    }
}

impl From<handlebars::TemplateError> for InspectError {
    fn from(err: handlebars::TemplateError) -> Self {
        InspectError::Template(format!("invalid template: {}", err))
    }
}

impl From<lettre::address::AddressError> for InspectError {
    fn from(err: lettre::address::AddressError) -> Self {
        InspectError::notification("email", format!("address error: {}", err))
    }
}

impl From<lettre::error::Error> for InspectError {
    fn from(err: lettre::error::Error) -> Self {
        InspectError::notification("email", err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for InspectError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        InspectError::notification("email", format!("SMTP error: {}", err))
    }
}
