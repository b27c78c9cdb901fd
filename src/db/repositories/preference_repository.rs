// Preference Repository Implementation
// Resolves the enabled notification channels of a target's owner

use crate::InspectError;
use crate::db::connection::{BindValue, DatabasePool};
use crate::db::models::NotificationPreference;
use crate::db::traits::{PreferenceRepository, TargetRef};
use async_trait::async_trait;

pub struct PreferenceRepositoryImpl {
    pool: DatabasePool,
}

impl PreferenceRepositoryImpl {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Add a notification preference for a user
    pub async fn create_preference(
        &self,
        user_id: &str,
        channel: &str,
        recipient: &str,
        enabled: bool,
    ) -> crate::Result<()> {
        let mut qb = self.pool.query_builder();
        let query = qb.insert_query(
            "notification_preferences",
            &["user_id", "channel", "recipient", "enabled"],
        );

        self.pool
            .execute(
                &query,
                vec![
                    BindValue::String(user_id.to_string()),
                    BindValue::String(channel.to_string()),
                    BindValue::String(recipient.to_string()),
                    BindValue::Bool(enabled),
                ],
            )
            .await
            .map_err(|e| {
                InspectError::Database(format!("Failed to insert notification preference: {}", e))
            })?;

        Ok(())
    }
}

/// Owner table and id column for a target reference
fn owner_join(target: TargetRef<'_>) -> (&'static str, &str) {
    match target {
        TargetRef::Domain(id) => ("domains", id),
        TargetRef::Endpoint(id) => ("endpoints", id),
    }
}

#[async_trait]
impl PreferenceRepository for PreferenceRepositoryImpl {
    async fn get_enabled_by_owner(
        &self,
        target: TargetRef<'_>,
    ) -> crate::Result<Vec<NotificationPreference>> {
        let (owner_table, target_id) = owner_join(target);
        let mut qb = self.pool.query_builder();
        let query = format!(
            r#"
            SELECT np.id, np.user_id, np.channel, np.recipient, np.enabled
            FROM notification_preferences np
            JOIN {owner} t ON t.user_id = np.user_id
            WHERE t.id = {id} AND np.enabled = {enabled}
            ORDER BY np.id
            "#,
            owner = owner_table,
            id = qb.placeholder(),
            enabled = qb.placeholder(),
        );

        let prefs = match &self.pool {
            DatabasePool::Postgres(pool) => {
                sqlx::query_as::<_, NotificationPreference>(&query)
                    .bind(target_id)
                    .bind(true)
                    .fetch_all(pool)
                    .await
            }
            DatabasePool::Sqlite(pool) => {
                sqlx::query_as::<_, NotificationPreference>(&query)
                    .bind(target_id)
                    .bind(true)
                    .fetch_all(pool)
                    .await
            }
        }
        .map_err(|e| {
            InspectError::Database(format!("Failed to fetch notification preferences: {}", e))
        })?;

        Ok(prefs)
    }
}
