//! Versioned schema migrations
//!
//! Applied versions are tracked in `schema_migrations`; each pending migration
//! runs in its own transaction together with its bookkeeping row.

use std::collections::HashSet;

use crate::error::Result;
use sqlx::PgPool;
use tracing::{debug, info};

/// Apply every migration not yet recorded
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    let applied = applied_versions(pool).await?;

    for (version, name, sql) in pending(get_migrations(), &applied) {
        info!(version = version, name = name, "Applying migration");

        let mut tx = pool.begin().await?;
        sqlx::query(sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
            .bind(version)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    debug!(applied = applied.len(), "Schema up to date");
    Ok(())
}

async fn applied_versions(pool: &PgPool) -> Result<HashSet<i32>> {
    let versions = sqlx::query_scalar::<_, i32>("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await?;
    Ok(versions.into_iter().collect())
}

fn pending(
    migrations: Vec<(i32, &'static str, &'static str)>,
    applied: &HashSet<i32>,
) -> Vec<(i32, &'static str, &'static str)> {
    migrations
        .into_iter()
        .filter(|(version, _, _)| !applied.contains(version))
        .collect()
}

/// Get all migrations in order
fn get_migrations() -> Vec<(i32, &'static str, &'static str)> {
    vec![(1, "kv_store", MIGRATION_001_KV_STORE)]
}

// Migration 1: key-value table holding serialized collections
const MIGRATION_001_KV_STORE: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key VARCHAR(255) PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;
