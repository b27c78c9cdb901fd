// Endpoint Models
// Registered HTTP endpoints and their healthcheck history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// HTTP endpoint registered for health inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Endpoint {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub success_code: i32,
}

impl Endpoint {
    /// Create a new endpoint with a fresh id
    pub fn new(user_id: impl Into<String>, url: impl Into<String>, success_code: u16) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            url: url.into(),
            success_code: i32::from(success_code),
        }
    }
}

/// Outcome of one healthcheck
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Healthcheck {
    pub id: String,
    pub endpoint_id: String,
    pub status_code: i32,
    pub took_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl Healthcheck {
    /// Create a healthcheck record stamped at `checked_at`
    pub fn new(
        endpoint_id: impl Into<String>,
        status_code: u16,
        took_ms: i64,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            endpoint_id: endpoint_id.into(),
            status_code: i32::from(status_code),
            took_ms,
            created_at: checked_at,
        }
    }
}
