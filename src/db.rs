//! SQLite migration runner.

use anyhow::Result;
use sqlx::SqlitePool;
use std::{fs, path::Path};

/// Run SQLite migrations from a SQL file, statement by statement.
pub async fn run_migrations(db: &SqlitePool, path: &str) -> Result<()> {
    if !Path::new(path).exists() {
        anyhow::bail!("Migration file not found: {}", path);
    }

    let sql = fs::read_to_string(path)?;
    run_migration_sql(db, &sql).await
}

/// Execute the statements of an already-loaded migration script.
pub async fn run_migration_sql(db: &SqlitePool, sql: &str) -> Result<()> {
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}
