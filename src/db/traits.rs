// Database Traits
// Narrow repository interfaces consumed by the inspection core

use crate::db::models::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository for one kind of inspected target and its check history
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Target row type
    type Target: Send + Sync + 'static;
    /// Check history row type
    type Check: Send + Sync + 'static;

    /// Load every target, fresh for each run
    async fn get_all(&self) -> crate::Result<Vec<Self::Target>>;

    /// Persist one check result
    async fn save_check(&self, check: &Self::Check) -> crate::Result<()>;

    /// Delete check history created before `cutoff`, returning the row count
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> crate::Result<u64>;
}

/// Domains with their certificate checks
pub type DomainRepository = dyn TargetRepository<Target = Domain, Check = CertCheck>;

/// Endpoints with their healthchecks
pub type EndpointRepository = dyn TargetRepository<Target = Endpoint, Check = Healthcheck>;

/// Reference to the target an event is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef<'a> {
    Domain(&'a str),
    Endpoint(&'a str),
}

/// Notification preference lookups
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Enabled preferences of the user owning `target`
    async fn get_enabled_by_owner(
        &self,
        target: TargetRef<'_>,
    ) -> crate::Result<Vec<NotificationPreference>>;
}
