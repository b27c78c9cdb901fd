// Domain Models
// Registered domains and their certificate check history

use crate::inspector::types::CertStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Domain registered for TLS certificate inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Domain {
    pub id: String,
    pub user_id: String,
    pub domain: String,
}

impl Domain {
    /// Create a new domain with a fresh id
    pub fn new(user_id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            domain: domain.into(),
        }
    }
}

/// Outcome of one certificate check
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CertCheck {
    pub id: String,
    pub domain_id: String,
    pub status: String,
    pub expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CertCheck {
    /// Create a check record stamped at `checked_at`
    pub fn new(
        domain_id: impl Into<String>,
        status: CertStatus,
        expiry: Option<DateTime<Utc>>,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            domain_id: domain_id.into(),
            status: status.to_string(),
            expiry,
            created_at: checked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_ids_are_unique() {
        let a = Domain::new("user-1", "example.com");
        let b = Domain::new("user-1", "example.com");
        assert_ne!(a.id, b.id);
        assert_eq!(a.domain, "example.com");
    }

    #[test]
    fn test_cert_check_stores_status_text() {
        let now = Utc::now();
        let check = CertCheck::new("dom-1", CertStatus::AboutToExpire, Some(now), now);
        assert_eq!(check.status, "AboutToExpire");
        assert_eq!(check.expiry, Some(now));
        assert_eq!(check.created_at, now);
    }
}
