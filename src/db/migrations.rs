// Database Migrations
// sqlx migrations for PostgreSQL, a transactional manual runner for SQLite

use crate::InspectError;
use crate::db::connection::DatabasePool;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;

/// PostgreSQL schema, embedded at compile time
pub static POSTGRES_MIGRATOR: Migrator = sqlx::migrate!("./migrations/postgres");

/// SQLite schema, embedded at compile time and applied by `run_sqlite_migrations`
pub static SQLITE_MIGRATOR: Migrator = sqlx::migrate!("./migrations/sqlite");

/// Run all pending migrations. Already-applied versions are skipped.
pub async fn run_migrations(pool: &DatabasePool) -> crate::Result<()> {
    match pool {
        DatabasePool::Postgres(pg_pool) => {
            POSTGRES_MIGRATOR.run(pg_pool).await.map_err(|e| {
                InspectError::Database(format!("PostgreSQL migration failed: {}", e))
            })?;
        }
        DatabasePool::Sqlite(sqlite_pool) => {
            run_sqlite_migrations(sqlite_pool).await?;
        }
    }

    Ok(())
}

/// Apply the embedded SQLite migrations, tracked in `_certwatch_migrations`
async fn run_sqlite_migrations(pool: &SqlitePool) -> crate::Result<()> {
    create_tracking_table(pool).await?;

    for migration in SQLITE_MIGRATOR.iter() {
        if migration.migration_type.is_down_migration() {
            continue;
        }
        apply_sqlite_migration(pool, migration.version, &migration.description, &migration.sql)
            .await?;
    }

    Ok(())
}

async fn create_tracking_table(pool: &SqlitePool) -> crate::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _certwatch_migrations (
            version BIGINT PRIMARY KEY,
            description TEXT NOT NULL,
            installed_on TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| InspectError::Database(format!("Failed to create migrations table: {}", e)))?;

    Ok(())
}

/// Apply one migration and record it in the same transaction. A failing
/// statement leaves neither schema changes nor a tracking row behind.
async fn apply_sqlite_migration(
    pool: &SqlitePool,
    version: i64,
    description: &str,
    sql: &str,
) -> crate::Result<()> {
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _certwatch_migrations WHERE version = ?")
            .bind(version)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                InspectError::Database(format!("Failed to check migration status: {}", e))
            })?;
    if applied > 0 {
        return Ok(());
    }

    let mut tx = pool.begin().await.map_err(|e| {
        InspectError::Database(format!("Failed to start migration {}: {}", description, e))
    })?;

    sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(|e| {
        InspectError::Database(format!("Failed to execute migration {}: {}", description, e))
    })?;

    sqlx::query(
        "INSERT INTO _certwatch_migrations (version, description, installed_on) VALUES (?, ?, ?)",
    )
    .bind(version)
    .bind(description)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        InspectError::Database(format!("Failed to record migration {}: {}", description, e))
    })?;

    tx.commit().await.map_err(|e| {
        InspectError::Database(format!("Failed to commit migration {}: {}", description, e))
    })?;

    tracing::debug!("Applied migration {}", description);
    Ok(())
}
