// Endpoint Repository Implementation
// Handles database operations for endpoints and healthchecks

use crate::InspectError;
use crate::db::connection::{BindValue, DatabasePool};
use crate::db::models::{Endpoint, Healthcheck};
use crate::db::traits::TargetRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct EndpointRepositoryImpl {
    pool: DatabasePool,
}

impl EndpointRepositoryImpl {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Register an endpoint for inspection
    pub async fn create_endpoint(&self, endpoint: &Endpoint) -> crate::Result<()> {
        let mut qb = self.pool.query_builder();
        let query = qb.insert_query(
            "endpoints",
            &["id", "user_id", "url", "success_code", "created_at"],
        );

        self.pool
            .execute(
                &query,
                vec![
                    BindValue::String(endpoint.id.clone()),
                    BindValue::String(endpoint.user_id.clone()),
                    BindValue::String(endpoint.url.clone()),
                    BindValue::Int32(endpoint.success_code),
                    BindValue::DateTime(Utc::now()),
                ],
            )
            .await
            .map_err(|e| InspectError::Database(format!("Failed to insert endpoint: {}", e)))?;

        Ok(())
    }

    /// Healthcheck history for one endpoint, newest first
    pub async fn get_checks_by_endpoint(
        &self,
        endpoint_id: &str,
    ) -> crate::Result<Vec<Healthcheck>> {
        let checks = match &self.pool {
            DatabasePool::Postgres(pool) => {
                sqlx::query_as::<_, Healthcheck>(
                    r#"
                    SELECT id, endpoint_id, status_code, took_ms, created_at
                    FROM healthchecks
                    WHERE endpoint_id = $1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(endpoint_id)
                .fetch_all(pool)
                .await
            }
            DatabasePool::Sqlite(pool) => {
                sqlx::query_as::<_, Healthcheck>(
                    r#"
                    SELECT id, endpoint_id, status_code, took_ms, created_at
                    FROM healthchecks
                    WHERE endpoint_id = ?
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(endpoint_id)
                .fetch_all(pool)
                .await
            }
        }
        .map_err(|e| InspectError::Database(format!("Failed to fetch healthchecks: {}", e)))?;

        Ok(checks)
    }
}

#[async_trait]
impl TargetRepository for EndpointRepositoryImpl {
    type Target = Endpoint;
    type Check = Healthcheck;

    async fn get_all(&self) -> crate::Result<Vec<Endpoint>> {
        let query = "SELECT id, user_id, url, success_code FROM endpoints ORDER BY created_at";

        let endpoints = match &self.pool {
            DatabasePool::Postgres(pool) => {
                sqlx::query_as::<_, Endpoint>(query).fetch_all(pool).await
            }
            DatabasePool::Sqlite(pool) => {
                sqlx::query_as::<_, Endpoint>(query).fetch_all(pool).await
            }
        }
        .map_err(|e| InspectError::Database(format!("Failed to fetch endpoints: {}", e)))?;

        Ok(endpoints)
    }

    async fn save_check(&self, check: &Healthcheck) -> crate::Result<()> {
        let mut qb = self.pool.query_builder();
        let query = qb.insert_query(
            "healthchecks",
            &["id", "endpoint_id", "status_code", "took_ms", "created_at"],
        );

        self.pool
            .execute(
                &query,
                vec![
                    BindValue::String(check.id.clone()),
                    BindValue::String(check.endpoint_id.clone()),
                    BindValue::Int32(check.status_code),
                    BindValue::Int64(check.took_ms),
                    BindValue::DateTime(check.created_at),
                ],
            )
            .await
            .map_err(|e| InspectError::Database(format!("Failed to insert healthcheck: {}", e)))?;

        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> crate::Result<u64> {
        let mut qb = self.pool.query_builder();
        let query = qb.delete_before_query("healthchecks", "created_at");

        let removed = self
            .pool
            .execute(&query, vec![BindValue::DateTime(cutoff)])
            .await
            .map_err(|e| {
                InspectError::Database(format!("Failed to delete old healthchecks: {}", e))
            })?;

        Ok(removed)
    }
}
