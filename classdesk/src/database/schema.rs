//! Database schema and migrations
//!
//! Schema for the self-hosted SQLite document store: one `documents`
//! table keyed by (collection, id) holding JSON bodies.

use crate::error::{Result, StoreError};
use sqlx::{sqlite::SqlitePool, Row};

/// Initialize database with schema
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await
        .map_err(StoreError::from)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(StoreError::from)?;

    let current_version: i32 = sqlx::query("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await
        .map_err(StoreError::from)?
        .get(0);

    tracing::info!("Current database version: {}", current_version);

    apply_migrations(pool, current_version)
        .await
        .map_err(StoreError::from)?;

    tracing::info!("Database initialization complete");
    Ok(())
}

async fn apply_migrations(
    pool: &SqlitePool,
    current_version: i32,
) -> std::result::Result<(), sqlx::Error> {
    for (version, sql) in get_migrations() {
        if version <= current_version {
            continue;
        }

        tracing::info!("Applying migration version {}", version);

        let mut tx = pool.begin().await?;

        for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query("INSERT INTO migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Migration version {} applied successfully", version);
    }

    Ok(())
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![
        (1, include_str!("migrations/001_documents.sql")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_database() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();

        let applied: i32 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(applied, get_migrations().len() as i32);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();
        initialize_database(&pool).await.unwrap();

        let version: i32 = sqlx::query_scalar("SELECT MAX(version) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(version, get_migrations().len() as i32);
    }

    #[tokio::test]
    async fn test_documents_table_exists() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();

        let tables: i32 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'documents'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(tables, 1);
    }

    #[tokio::test]
    async fn test_documents_only_has_primary_key_index() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();

        // Reads go through (collection, id) or rowid order
        let extra: i32 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND tbl_name = 'documents' AND name NOT LIKE 'sqlite_autoindex%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(extra, 0);
    }
}
