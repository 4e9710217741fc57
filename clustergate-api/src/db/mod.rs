//! Database layer using SQLite
//!
//! Holds the registered cluster credentials.

pub mod migrations;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Database errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Failed to create database directory: {0}")]
    Directory(#[from] std::io::Error),

    #[error("Database connection failed after {attempts} attempt(s): {source}")]
    Connect {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migration {name} failed: {source}")]
    Migration {
        name: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        Self::connect_with_retry(database_url, max_connections, 1, Duration::ZERO).await
    }

    /// Connect, retrying while the database is not reachable yet
    pub async fn connect_with_retry(
        database_url: &str,
        max_connections: u32,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self, DbError> {
        // Create parent directory if needed
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }

        // In-memory databases exist per connection, so they get exactly one
        // that is never recycled
        let in_memory = database_url.contains(":memory:");

        let attempts = attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let options = if in_memory {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
            } else {
                SqlitePoolOptions::new().max_connections(max_connections.max(1))
            };
            let result = options.connect(&Self::with_create_mode(database_url)).await;

            match result {
                Ok(pool) => {
                    tracing::info!("Database connection established");
                    return Ok(Self { pool });
                }
                Err(e) if attempt < attempts => {
                    tracing::error!(
                        "Failed to connect to database, retrying in {:?}... (attempt {}/{}): {}",
                        delay,
                        attempt,
                        attempts,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(DbError::Connect {
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }

    /// SQLite refuses to create missing files unless asked to
    fn with_create_mode(database_url: &str) -> String {
        if database_url.contains(":memory:") || database_url.contains("mode=") {
            database_url.to_string()
        } else if database_url.contains('?') {
            format!("{}&mode=rwc", database_url)
        } else {
            format!("{}?mode=rwc", database_url)
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), DbError> {
        migrations::run_migrations(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap round trip used by readiness checks
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Close the database connection
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mode_appended() {
        assert_eq!(
            Database::with_create_mode("sqlite:///var/lib/clustergate/clusters.db"),
            "sqlite:///var/lib/clustergate/clusters.db?mode=rwc"
        );
        assert_eq!(
            Database::with_create_mode("sqlite://x.db?cache=shared"),
            "sqlite://x.db?cache=shared&mode=rwc"
        );
        assert_eq!(Database::with_create_mode("sqlite::memory:"), "sqlite::memory:");
    }

    #[tokio::test]
    async fn test_memory_database_migrates_twice() {
        let db = Database::new("sqlite::memory:", 8).await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
        assert!(db.ping().await);
    }

    #[tokio::test]
    async fn test_file_database_created_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clusters.db");
        let url = format!("sqlite://{}", path.display());

        let db = Database::new(&url, 2).await.unwrap();
        db.migrate().await.unwrap();
        assert!(path.exists());
        db.close().await;
    }
}
