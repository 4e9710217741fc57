//! Credential storage
//!
//! Maps a cluster identifier to the opaque credential blob registered for it.
//! The blob is stored verbatim; interpreting it is the client factory's job.

use async_trait::async_trait;
use clustergate_common::{ClusterId, ClusterSummary};
use sqlx::Row;
use std::sync::Arc;

use super::error::{K8sError, K8sResult};
use crate::db::Database;

/// Key-value store of cluster credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a credential blob and return the identifier assigned to it
    async fn create(&self, credential: &str) -> K8sResult<ClusterId>;

    /// Fetch the credential blob of a cluster
    async fn get(&self, id: ClusterId) -> K8sResult<String>;

    /// Registered clusters, without their credentials
    async fn list(&self) -> K8sResult<Vec<ClusterSummary>>;
}

/// Credential store backed by the `clusters` table
pub struct SqliteCredentialStore {
    db: Arc<Database>,
}

impl SqliteCredentialStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn create(&self, credential: &str) -> K8sResult<ClusterId> {
        let result = sqlx::query("INSERT INTO clusters (config, created_at) VALUES (?, ?)")
            .bind(credential)
            .bind(chrono::Utc::now().timestamp())
            .execute(self.db.pool())
            .await
            .map_err(|e| K8sError::Internal(format!("Failed to store credential: {}", e)))?;

        let id = ClusterId(result.last_insert_rowid());
        tracing::debug!(cluster_id = %id, "Stored cluster credential");

        Ok(id)
    }

    async fn get(&self, id: ClusterId) -> K8sResult<String> {
        let row = sqlx::query("SELECT config FROM clusters WHERE id = ?")
            .bind(id.0)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| K8sError::Internal(format!("Database query failed: {}", e)))?;

        match row {
            Some(row) => Ok(row.try_get("config")?),
            None => Err(K8sError::ClusterNotFound(id)),
        }
    }

    async fn list(&self) -> K8sResult<Vec<ClusterSummary>> {
        let rows = sqlx::query("SELECT id, created_at FROM clusters ORDER BY id")
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| K8sError::Internal(format!("Database query failed: {}", e)))?;

        rows.into_iter()
            .map(|row| -> K8sResult<ClusterSummary> {
                Ok(ClusterSummary {
                    id: ClusterId(row.try_get("id")?),
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
