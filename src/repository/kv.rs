//! Persisted key-value store boundary
//!
//! The proxy list is stored as one serialized value under one key, always
//! fully overwritten.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::PgPool;
use tracing::debug;

use crate::error::Result;

/// Remote key-value store holding serialized collections
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns `None` when nothing was ever stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replaces whatever is stored under `key`
    async fn put(&self, key: &str, value: String) -> Result<()>;

    /// Backend name for logs and status output
    fn backend_name(&self) -> &'static str;
}

/// Postgres-backed store using the `kv_store` table
#[derive(Clone)]
pub struct PgKvStore {
    pool: PgPool,
}

impl PgKvStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for PgKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        let bytes = value.len();

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        debug!(key = key, bytes = bytes, "Stored value");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// In-process store; contents are lost on restart
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
    puts: AtomicUsize,
    #[cfg(test)]
    fail_puts: std::sync::atomic::AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls so far
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        #[cfg(test)]
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(crate::error::VigilError::Internal(
                "store unavailable".to_string(),
            ));
        }

        self.entries.lock().insert(key.to_string(), value);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
