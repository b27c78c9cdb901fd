// Database Configuration
// PostgreSQL and SQLite settings for the check history store

use crate::InspectError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Database type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Postgres,
    Sqlite,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub db_type: DatabaseType,

    // PostgreSQL settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,

    // SQLite settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Create PostgreSQL configuration
    pub fn postgres(
        host: String,
        port: u16,
        database: String,
        username: String,
        password: String,
    ) -> Self {
        Self {
            db_type: DatabaseType::Postgres,
            host: Some(host),
            port: Some(port),
            database: Some(database),
            username: Some(username),
            password: Some(password),
            max_connections: Some(20),
            path: None,
        }
    }

    /// Create SQLite configuration
    pub fn sqlite(path: PathBuf) -> Self {
        Self {
            db_type: DatabaseType::Sqlite,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            max_connections: None,
            path: Some(path),
        }
    }

    /// Generate database URL for sqlx
    pub fn connection_string(&self) -> crate::Result<String> {
        match self.db_type {
            DatabaseType::Postgres => {
                let host = self
                    .host
                    .as_ref()
                    .ok_or_else(|| InspectError::config("Missing PostgreSQL host"))?;
                let port = self
                    .port
                    .ok_or_else(|| InspectError::config("Missing PostgreSQL port"))?;
                let database = self
                    .database
                    .as_ref()
                    .ok_or_else(|| InspectError::config("Missing database name"))?;
                let username = self
                    .username
                    .as_ref()
                    .ok_or_else(|| InspectError::config("Missing username"))?;
                let password = self
                    .password
                    .as_ref()
                    .ok_or_else(|| InspectError::config("Missing password"))?;

                Ok(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    username, password, host, port, database
                ))
            }
            DatabaseType::Sqlite => {
                let path = self
                    .path
                    .as_ref()
                    .ok_or_else(|| InspectError::config("Missing SQLite path"))?;

                let path_str = path.to_string_lossy();
                if path_str == ":memory:" {
                    Ok(format!("sqlite:{}", path_str))
                } else if path_str.starts_with('/') {
                    Ok(format!("sqlite://{}", path.display()))
                } else {
                    Ok(format!("sqlite:{}", path.display()))
                }
            }
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::sqlite(PathBuf::from("certwatch.db"))
    }
}
