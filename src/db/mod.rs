// Database Module
// Check history store and the repositories the inspector consumes

pub mod config;
pub mod connection;
pub mod migrations;
pub mod models;
pub mod repositories;
pub mod traits;

// Re-exports
pub use config::{DatabaseConfig, DatabaseType};
pub use connection::{BindValue, DatabasePool, QueryBuilder};
pub use migrations::run_migrations;
pub use models::*;
pub use traits::*;

use repositories::{DomainRepositoryImpl, EndpointRepositoryImpl, PreferenceRepositoryImpl};
use std::sync::Arc;

/// Connected database with migrated schema and shared repositories
pub struct CertwatchDatabase {
    pool: DatabasePool,
    domains: Arc<DomainRepositoryImpl>,
    endpoints: Arc<EndpointRepositoryImpl>,
    preferences: Arc<PreferenceRepositoryImpl>,
}

impl CertwatchDatabase {
    /// Connect and run pending migrations
    pub async fn new(config: &DatabaseConfig) -> crate::Result<Self> {
        let pool = DatabasePool::new(config).await?;

        run_migrations(&pool).await?;

        Ok(Self {
            domains: Arc::new(DomainRepositoryImpl::new(pool.clone())),
            endpoints: Arc::new(EndpointRepositoryImpl::new(pool.clone())),
            preferences: Arc::new(PreferenceRepositoryImpl::new(pool.clone())),
            pool,
        })
    }

    /// Get database pool
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub fn domains(&self) -> Arc<DomainRepositoryImpl> {
        Arc::clone(&self.domains)
    }

    pub fn endpoints(&self) -> Arc<EndpointRepositoryImpl> {
        Arc::clone(&self.endpoints)
    }

    pub fn preferences(&self) -> Arc<PreferenceRepositoryImpl> {
        Arc::clone(&self.preferences)
    }

    /// Close database connection
    pub async fn close(self) {
        self.pool.close().await;
    }
}
