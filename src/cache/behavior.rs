//! Read-through caching engine.
//!
//! A single [`ReadThrough`] implementation serves every cached query type;
//! what differs per query lives in its [`CachePolicy`].

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::domain::fields::FieldMap;

use super::CacheServices;
use super::context::CacheContext;
use super::error::{CacheError, Cancelled};
use super::options::CacheEntryOptions;

/// Self-contained payload shape written to the store.
pub trait CachedShape: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn expires_at(&self) -> Option<OffsetDateTime>;
    fn set_expires_at(&mut self, at: OffsetDateTime);
}

/// Cached form of one page of a list query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPage {
    pub items: Vec<FieldMap>,
    pub page_number: u32,
    pub page_size: u32,
    pub records_filtered: u64,
    pub records_total: u64,
    pub message: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at_utc: Option<OffsetDateTime>,
}

impl CachedShape for CachedPage {
    fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at_utc
    }

    fn set_expires_at(&mut self, at: OffsetDateTime) {
        self.expires_at_utc = Some(at);
    }
}

/// Cached form of a single non-paged payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedScalar<T> {
    pub payload: T,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at_utc: Option<OffsetDateTime>,
}

impl<T> CachedScalar<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            expires_at_utc: None,
        }
    }
}

impl<T> CachedShape for CachedScalar<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at_utc
    }

    fn set_expires_at(&mut self, at: OffsetDateTime) {
        self.expires_at_utc = Some(at);
    }
}

/// Everything that varies between cached query types.
pub struct CachePolicy<Q, R, C> {
    /// Endpoint name used for TTL lookup; also the key prefix.
    pub endpoint: &'static str,
    pub build_key: fn(&Q) -> String,
    /// Failed results are passed through and never cached.
    pub is_success: fn(&R) -> bool,
    /// Deep copy into the cached shape; `None` marks the result as not cacheable.
    pub snapshot: fn(&R) -> Option<C>,
    pub restore: fn(C) -> R,
}

impl<Q, R, C> Clone for CachePolicy<Q, R, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Q, R, C> Copy for CachePolicy<Q, R, C> {}

pub struct ReadThrough<Q, R, C> {
    policy: CachePolicy<Q, R, C>,
    cache: CacheServices,
}

impl<Q, R, C> ReadThrough<Q, R, C>
where
    C: CachedShape,
{
    pub fn new(policy: CachePolicy<Q, R, C>, cache: CacheServices) -> Self {
        Self { policy, cache }
    }

    pub fn policy(&self) -> &CachePolicy<Q, R, C> {
        &self.policy
    }

    /// Serve `query` from cache, or run `next` and populate the cache from a
    /// cacheable result.
    ///
    /// A hit never runs `next`. Errors from `next` are returned untouched.
    pub async fn execute<F, Fut, E>(
        &self,
        ctx: &CacheContext,
        query: &Q,
        next: F,
    ) -> Result<R, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<Cancelled>,
    {
        let started = Instant::now();
        let key = (self.policy.build_key)(query);
        let options = self.cache.options.create(self.policy.endpoint);

        let cached: Option<C> = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => return Err(Cancelled.into()),
            cached = self.cache.provider.get(ctx, &key) => cached,
        };
        let lookup_latency = started.elapsed();

        if let Some(cached) = cached {
            let remaining = cached.expires_at().and_then(remaining_until);
            self.cache.diagnostics.report_hit(ctx, &key, remaining);
            self.cache.stats.record_hit(lookup_latency);
            return Ok((self.policy.restore)(cached));
        }

        let result = next().await?;
        if !(self.policy.is_success)(&result) {
            return Ok(result);
        }

        self.cache.diagnostics.report_miss(ctx, &key, None);
        self.cache.stats.record_miss(lookup_latency);

        let Some(mut snapshot) = (self.policy.snapshot)(&result) else {
            return Ok(result);
        };
        if !options.is_writable() {
            return Ok(result);
        }
        if ctx.is_cancelled() {
            debug!(
                target = "talentdesk::cache::behavior",
                key = %key,
                "operation cancelled; cache write abandoned"
            );
            return Ok(result);
        }

        snapshot.set_expires_at(OffsetDateTime::now_utc() + options.absolute_ttl);
        self.write(ctx, key, snapshot, options).await;
        Ok(result)
    }

    // The store write and index tracking run on their own task so that they
    // finish together even if the caller stops polling.
    async fn write(&self, ctx: &CacheContext, key: String, snapshot: C, options: CacheEntryOptions) {
        let provider = Arc::clone(&self.cache.provider);
        let task_ctx = ctx.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            provider
                .set(&task_ctx, &task_key, &snapshot, &options)
                .await
        });

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(CacheError::Aborted(join_error.to_string())),
        };

        if let Err(err) = outcome {
            metrics::counter!("talentdesk_cache_write_error_total").increment(1);
            warn!(
                target = "talentdesk::cache::behavior",
                key = %key,
                endpoint = self.policy.endpoint,
                error = %err,
                "cache write failed; returning uncached result"
            );
        }
    }
}

fn remaining_until(expires_at: OffsetDateTime) -> Option<Duration> {
    Duration::try_from(expires_at - OffsetDateTime::now_utc()).ok()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::application::caching::employees_policy;
    use crate::application::error::AppError;
    use crate::application::queries::{EmployeePage, GetEmployeesQuery};
    use crate::application::results::{PagedResult, RecordsCount};
    use crate::cache::config::{CacheConfig, SharedCacheConfig};
    use crate::cache::keys::INDEX_NAMESPACE;
    use crate::cache::store::{CacheStore, MemoryStore};

    /// Memory store that counts data writes; index entries are not counted.
    struct CountingStore {
        inner: MemoryStore,
        data_writes: AtomicUsize,
    }

    impl CountingStore {
        fn writes(&self) -> usize {
            self.data_writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CacheStore for CountingStore {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            self.inner.get(key).await
        }

        async fn set(
            &self,
            key: &str,
            value: Vec<u8>,
            options: &CacheEntryOptions,
        ) -> Result<(), CacheError> {
            if !key.contains(INDEX_NAMESPACE) {
                self.data_writes.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.set(key, value, options).await
        }

        async fn remove(&self, key: &str) -> Result<(), CacheError> {
            self.inner.remove(key).await
        }

        async fn remove_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
            self.inner.remove_by_prefix(prefix).await
        }

        async fn clear(&self) -> Result<u64, CacheError> {
            self.inner.clear().await
        }
    }

    type Engine = ReadThrough<GetEmployeesQuery, EmployeePage, CachedPage>;

    fn engine() -> (Engine, Arc<CountingStore>) {
        let config = CacheConfig::default();
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(&config),
            data_writes: AtomicUsize::new(0),
        });
        let services = CacheServices::new(SharedCacheConfig::new(config), store.clone());
        (ReadThrough::new(employees_policy(), services), store)
    }

    fn one_row() -> EmployeePage {
        let row: FieldMap = [("Id", json!(1)), ("FirstName", json!("Ada"))]
            .into_iter()
            .collect();
        PagedResult::success(
            vec![row],
            1,
            10,
            RecordsCount {
                records_filtered: 1,
                records_total: 4,
            },
        )
    }

    #[tokio::test]
    async fn miss_writes_once_and_hit_skips_next() {
        let (engine, store) = engine();
        let query = GetEmployeesQuery::default();
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let first = engine
            .execute(&CacheContext::new(), &query, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AppError>(one_row())
            })
            .await
            .expect("miss");
        let second = engine
            .execute(&CacheContext::new(), &query, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AppError>(one_row())
            })
            .await
            .expect("hit");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes(), 1);
        assert_eq!(first.value, second.value);
        assert_eq!(second.records_total, 4);
        let stats = engine.cache.stats.snapshot();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[tokio::test]
    async fn empty_page_is_returned_but_never_written() {
        let (engine, store) = engine();
        let query = GetEmployeesQuery::default();
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..2 {
            let page = engine
                .execute(&CacheContext::new(), &query, move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, AppError>(PagedResult::empty(1, 10))
                })
                .await
                .expect("empty page");
            assert!(page.is_success);
            assert!(page.value.is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn failure_passes_through_without_stats_or_writes() {
        let (engine, store) = engine();
        let query = GetEmployeesQuery::default();

        let page = engine
            .execute(&CacheContext::new(), &query, || async {
                Ok::<_, AppError>(PagedResult::failure("database unavailable", 1, 10))
            })
            .await
            .expect("failure result");

        assert!(!page.is_success);
        assert_eq!(store.writes(), 0);
        let stats = engine.cache.stats.snapshot();
        assert_eq!((stats.hits, stats.misses), (0, 0));
    }

    #[tokio::test]
    async fn errors_from_next_are_returned_untouched() {
        let (engine, store) = engine();

        let err = engine
            .execute(&CacheContext::new(), &GetEmployeesQuery::default(), || async {
                Err::<EmployeePage, _>(AppError::validation("bad filter"))
            })
            .await
            .expect_err("validation error");

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn cancellation_before_lookup_skips_everything() {
        let (engine, store) = engine();
        let token = CancellationToken::new();
        token.cancel();
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let err = engine
            .execute(
                &CacheContext::with_cancellation(token),
                &GetEmployeesQuery::default(),
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, AppError>(one_row())
                },
            )
            .await
            .expect_err("cancelled");

        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.writes(), 0);
    }
}
