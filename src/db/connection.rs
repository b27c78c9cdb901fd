// Database Connection Pool
// Manages PostgreSQL and SQLite connection pools with sqlx

use crate::InspectError;
use crate::db::config::{DatabaseConfig, DatabaseType};
use sqlx::{Pool, Postgres, Sqlite};
use std::str::FromStr;
use std::time::Duration;

/// QueryBuilder that handles placeholder syntax differences between databases.
/// PostgreSQL uses $1, $2, $3... while SQLite uses ?, ?, ?...
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    db_type: DatabaseType,
    param_count: usize,
}

impl QueryBuilder {
    /// Create a new query builder for the given database type
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            param_count: 0,
        }
    }

    /// Get the next placeholder for the current database type
    pub fn placeholder(&mut self) -> String {
        self.param_count += 1;
        match self.db_type {
            DatabaseType::Postgres => format!("${}", self.param_count),
            DatabaseType::Sqlite => "?".to_string(),
        }
    }

    /// Generate N placeholders separated by commas
    pub fn placeholders(&mut self, count: usize) -> String {
        (0..count)
            .map(|_| self.placeholder())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Reset the placeholder counter
    pub fn reset(&mut self) {
        self.param_count = 0;
    }

    /// Build an INSERT query with the correct placeholders
    pub fn insert_query(&mut self, table: &str, columns: &[&str]) -> String {
        self.reset();
        let cols = columns.join(", ");
        let placeholders = self.placeholders(columns.len());
        format!("INSERT INTO {} ({}) VALUES ({})", table, cols, placeholders)
    }

    /// Build a `DELETE ... WHERE column < cutoff` query
    pub fn delete_before_query(&mut self, table: &str, timestamp_col: &str) -> String {
        self.reset();
        let placeholder = self.placeholder();
        format!(
            "DELETE FROM {} WHERE {} < {}",
            table, timestamp_col, placeholder
        )
    }
}

/// Database pool enum supporting both PostgreSQL and SQLite
#[derive(Clone)]
pub enum DatabasePool {
    Postgres(Pool<Postgres>),
    Sqlite(Pool<Sqlite>),
}

impl DatabasePool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> crate::Result<Self> {
        let pool = match config.db_type {
            DatabaseType::Postgres => {
                let connection_string = config.connection_string()?;
                let max_connections = config.max_connections.unwrap_or(20);

                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(max_connections)
                    .acquire_timeout(Duration::from_secs(30))
                    .connect(&connection_string)
                    .await
                    .map_err(|e| {
                        InspectError::Database(format!("PostgreSQL connection failed: {}", e))
                    })?;

                DatabasePool::Postgres(pool)
            }
            DatabaseType::Sqlite => {
                let connection_string = config.connection_string()?;

                let connect_options =
                    sqlx::sqlite::SqliteConnectOptions::from_str(&connection_string)
                        .map_err(|e| {
                            InspectError::Database(format!(
                                "Failed to parse SQLite connection string: {}",
                                e
                            ))
                        })?
                        .create_if_missing(true);

                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(1) // SQLite is single-writer
                    .acquire_timeout(Duration::from_secs(30))
                    .connect_with(connect_options)
                    .await
                    .map_err(|e| {
                        InspectError::Database(format!("SQLite connection failed: {}", e))
                    })?;

                DatabasePool::Sqlite(pool)
            }
        };

        Ok(pool)
    }

    /// Get database type
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DatabasePool::Postgres(_) => DatabaseType::Postgres,
            DatabasePool::Sqlite(_) => DatabaseType::Sqlite,
        }
    }

    /// Close the connection pool
    pub async fn close(&self) {
        match self {
            DatabasePool::Postgres(pool) => pool.close().await,
            DatabasePool::Sqlite(pool) => pool.close().await,
        }
    }

    /// Create a QueryBuilder for this pool's database type
    pub fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(self.db_type())
    }

    /// Execute a statement and return the number of affected rows
    pub async fn execute(&self, query: &str, bindings: Vec<BindValue>) -> crate::Result<u64> {
        let rows = match self {
            DatabasePool::Postgres(pool) => {
                let mut q = sqlx::query(query);
                for binding in bindings {
                    q = binding.bind_postgres(q);
                }
                q.execute(pool)
                    .await
                    .map_err(|e| InspectError::Database(format!("Query failed: {}", e)))?
                    .rows_affected()
            }
            DatabasePool::Sqlite(pool) => {
                let mut q = sqlx::query(query);
                for binding in bindings {
                    q = binding.bind_sqlite(q);
                }
                q.execute(pool)
                    .await
                    .map_err(|e| InspectError::Database(format!("Query failed: {}", e)))?
                    .rows_affected()
            }
        };

        Ok(rows)
    }
}

/// Enum to hold different bind value types for database-agnostic query binding
#[derive(Debug, Clone)]
pub enum BindValue {
    Int32(i32),
    Int64(i64),
    String(String),
    Bool(bool),
    DateTime(chrono::DateTime<chrono::Utc>),
    OptDateTime(Option<chrono::DateTime<chrono::Utc>>),
}

impl BindValue {
    /// Bind this value to a Postgres query
    fn bind_postgres<'q>(
        self,
        query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    ) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
        match self {
            BindValue::Int32(v) => query.bind(v),
            BindValue::Int64(v) => query.bind(v),
            BindValue::String(v) => query.bind(v),
            BindValue::Bool(v) => query.bind(v),
            BindValue::DateTime(v) => query.bind(v),
            BindValue::OptDateTime(v) => query.bind(v),
        }
    }

    /// Bind this value to a SQLite query
    fn bind_sqlite<'q>(
        self,
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            BindValue::Int32(v) => query.bind(v),
            BindValue::Int64(v) => query.bind(v),
            BindValue::String(v) => query.bind(v),
            BindValue::Bool(v) => query.bind(v),
            BindValue::DateTime(v) => query.bind(v),
            BindValue::OptDateTime(v) => query.bind(v),
        }
    }
}
