//! PostgreSQL-backed [`CacheStore`] shared by every instance of the service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheEntryOptions, CacheError, CacheStore};

const STORE: &str = "postgres";

#[derive(Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Delete entries whose window has closed; returns the count removed.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE expires_at <= now()")
            .execute(self.pool.as_ref())
            .await
            .map(|done| done.rows_affected())
            .map_err(store_error)
    }

    /// Purge expired rows every `every` until `shutdown` fires.
    pub fn spawn_sweeper(self, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match self.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => {
                        metrics::counter!("talentdesk_cache_purged_total").increment(purged);
                        debug!(
                            target = "talentdesk::infra::db::cache_store",
                            purged,
                            "purged expired cache entries"
                        );
                    }
                    Err(err) => warn!(
                        target = "talentdesk::infra::db::cache_store",
                        error = %err,
                        "failed to purge expired cache entries"
                    ),
                }
            }
        })
    }
}

fn store_error(err: sqlx::Error) -> CacheError {
    CacheError::store(STORE, err)
}

#[async_trait]
impl CacheStore for PostgresStore {
    fn name(&self) -> &'static str {
        STORE
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        sqlx::query_scalar(
            r#"
            UPDATE cache_entries
            SET expires_at = CASE
                WHEN sliding_seconds IS NULL THEN expires_at
                ELSE LEAST(now() + make_interval(secs => sliding_seconds), hard_expires_at)
            END
            WHERE key = $1 AND expires_at > now()
            RETURNING value
            "#,
        )
        .bind(key)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(store_error)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        options: &CacheEntryOptions,
    ) -> Result<(), CacheError> {
        if !options.is_writable() {
            return Ok(());
        }
        let absolute = options.absolute_ttl.as_secs_f64();
        let window = options
            .sliding_ttl
            .map_or(absolute, |sliding| sliding.as_secs_f64().min(absolute));
        let sliding_seconds = options
            .sliding_ttl
            .map(|sliding| i64::try_from(sliding.as_secs()).unwrap_or(i64::MAX));

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at, sliding_seconds, hard_expires_at)
            VALUES ($1, $2, now() + make_interval(secs => $3), $4, now() + make_interval(secs => $5))
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at,
                sliding_seconds = EXCLUDED.sliding_seconds,
                hard_expires_at = EXCLUDED.hard_expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(window)
        .bind(sliding_seconds)
        .bind(absolute)
        .execute(self.pool.as_ref())
        .await
        .map(|_| ())
        .map_err(store_error)
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = $1")
            .bind(key)
            .execute(self.pool.as_ref())
            .await
            .map(|_| ())
            .map_err(store_error)
    }

    async fn remove_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE starts_with(key, $1)")
            .bind(prefix)
            .execute(self.pool.as_ref())
            .await
            .map(|done| done.rows_affected())
            .map_err(store_error)
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        sqlx::query("DELETE FROM cache_entries")
            .execute(self.pool.as_ref())
            .await
            .map(|done| done.rows_affected())
            .map_err(store_error)
    }
}
