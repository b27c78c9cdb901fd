// Domain Repository Implementation
// Handles database operations for domains and certificate checks

use crate::InspectError;
use crate::db::connection::{BindValue, DatabasePool};
use crate::db::models::{CertCheck, Domain};
use crate::db::traits::TargetRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct DomainRepositoryImpl {
    pool: DatabasePool,
}

impl DomainRepositoryImpl {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Register a domain for inspection
    pub async fn create_domain(&self, domain: &Domain) -> crate::Result<()> {
        let mut qb = self.pool.query_builder();
        let query = qb.insert_query("domains", &["id", "user_id", "domain", "created_at"]);

        self.pool
            .execute(
                &query,
                vec![
                    BindValue::String(domain.id.clone()),
                    BindValue::String(domain.user_id.clone()),
                    BindValue::String(domain.domain.clone()),
                    BindValue::DateTime(Utc::now()),
                ],
            )
            .await
            .map_err(|e| InspectError::Database(format!("Failed to insert domain: {}", e)))?;

        Ok(())
    }

    /// Check history for one domain, newest first
    pub async fn get_checks_by_domain(&self, domain_id: &str) -> crate::Result<Vec<CertCheck>> {
        let checks = match &self.pool {
            DatabasePool::Postgres(pool) => {
                sqlx::query_as::<_, CertCheck>(
                    r#"
                    SELECT id, domain_id, status, expiry, created_at
                    FROM cert_checks
                    WHERE domain_id = $1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(domain_id)
                .fetch_all(pool)
                .await
            }
            DatabasePool::Sqlite(pool) => {
                sqlx::query_as::<_, CertCheck>(
                    r#"
                    SELECT id, domain_id, status, expiry, created_at
                    FROM cert_checks
                    WHERE domain_id = ?
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(domain_id)
                .fetch_all(pool)
                .await
            }
        }
        .map_err(|e| InspectError::Database(format!("Failed to fetch cert checks: {}", e)))?;

        Ok(checks)
    }
}

#[async_trait]
impl TargetRepository for DomainRepositoryImpl {
    type Target = Domain;
    type Check = CertCheck;

    async fn get_all(&self) -> crate::Result<Vec<Domain>> {
        let query = "SELECT id, user_id, domain FROM domains ORDER BY created_at";

        let domains = match &self.pool {
            DatabasePool::Postgres(pool) => {
                sqlx::query_as::<_, Domain>(query).fetch_all(pool).await
            }
            DatabasePool::Sqlite(pool) => sqlx::query_as::<_, Domain>(query).fetch_all(pool).await,
        }
        .map_err(|e| InspectError::Database(format!("Failed to fetch domains: {}", e)))?;

        Ok(domains)
    }

    async fn save_check(&self, check: &CertCheck) -> crate::Result<()> {
        let mut qb = self.pool.query_builder();
        let query = qb.insert_query(
            "cert_checks",
            &["id", "domain_id", "status", "expiry", "created_at"],
        );

        self.pool
            .execute(
                &query,
                vec![
                    BindValue::String(check.id.clone()),
                    BindValue::String(check.domain_id.clone()),
                    BindValue::String(check.status.clone()),
                    BindValue::OptDateTime(check.expiry),
                    BindValue::DateTime(check.created_at),
                ],
            )
            .await
            .map_err(|e| InspectError::Database(format!("Failed to insert cert check: {}", e)))?;

        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> crate::Result<u64> {
        let mut qb = self.pool.query_builder();
        let query = qb.delete_before_query("cert_checks", "created_at");

        let removed = self
            .pool
            .execute(&query, vec![BindValue::DateTime(cutoff)])
            .await
            .map_err(|e| {
                InspectError::Database(format!("Failed to delete old cert checks: {}", e))
            })?;

        Ok(removed)
    }
}
