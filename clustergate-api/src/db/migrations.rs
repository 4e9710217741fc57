//! Database migrations

use super::DbError;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    // Create migrations table
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            executed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .map_err(|source| DbError::Migration {
        name: "000_create_migrations_table".to_string(),
        source,
    })?;

    // Run migrations in order
    run_migration(pool, "001_create_clusters_table", MIGRATION_001_CREATE_CLUSTERS).await?;

    Ok(())
}

async fn run_migration(pool: &SqlitePool, name: &str, sql: &str) -> Result<(), DbError> {
    use sqlx::Row;

    let failed = |source| DbError::Migration {
        name: name.to_string(),
        source,
    };

    // Check if migration already ran
    let row = sqlx::query("SELECT COUNT(*) as count FROM migrations WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(failed)?;

    let count: i64 = row.get("count");
    if count > 0 {
        tracing::debug!("Migration {} already applied", name);
        return Ok(());
    }

    tracing::info!("Running migration: {}", name);

    let mut tx = pool.begin().await.map_err(failed)?;
    sqlx::query(sql).execute(&mut *tx).await.map_err(failed)?;
    sqlx::query("INSERT INTO migrations (name) VALUES (?)")
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(failed)?;
    tx.commit().await.map_err(failed)?;

    tracing::info!("Migration {} completed", name);

    Ok(())
}

const MIGRATION_001_CREATE_CLUSTERS: &str = "
CREATE TABLE clusters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    config TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
";
