//! Gated, typed access to the underlying [`CacheStore`].

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use super::config::SharedCacheConfig;
use super::context::CacheContext;
use super::error::CacheError;
use super::index::CacheKeyIndex;
use super::keys::namespaced;
use super::options::CacheEntryOptions;
use super::store::CacheStore;

/// Reads and writes are gated on `enabled && !disable_cache && !bypassed`,
/// evaluated on every call. Removals are never gated.
#[derive(Clone)]
pub struct CacheProvider {
    store: Arc<dyn CacheStore>,
    index: CacheKeyIndex,
    config: SharedCacheConfig,
}

impl CacheProvider {
    pub fn new(store: Arc<dyn CacheStore>, config: SharedCacheConfig) -> Self {
        let index = CacheKeyIndex::new(Arc::clone(&store), config.clone());
        Self {
            store,
            index,
            config,
        }
    }

    pub fn index(&self) -> &CacheKeyIndex {
        &self.index
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    fn is_active(&self, ctx: &CacheContext) -> bool {
        self.config.snapshot().is_enabled() && !ctx.is_bypassed()
    }

    fn storage_key(&self, key: &str) -> String {
        namespaced(&self.config.snapshot().key_prefix, key)
    }

    /// Any store or decode failure reads as a miss.
    pub async fn get<T: DeserializeOwned>(&self, ctx: &CacheContext, key: &str) -> Option<T> {
        if !self.is_active(ctx) {
            return None;
        }

        let bytes = match self.store.get(&self.storage_key(key)).await {
            Ok(bytes) => bytes?,
            Err(err) => {
                warn!(
                    target = "talentdesk::cache::provider",
                    key,
                    store = self.store.name(),
                    error = %err,
                    "cache lookup failed; treating as miss"
                );
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target = "talentdesk::cache::provider",
                    key,
                    error = %CacheError::Decode(err),
                    "cached payload unreadable; treating as miss"
                );
                None
            }
        }
    }

    /// Write `value` and track its key in the index.
    ///
    /// Index tracking failures are logged and counted, never returned.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        ctx: &CacheContext,
        key: &str,
        value: &T,
        options: &CacheEntryOptions,
    ) -> Result<(), CacheError> {
        if !self.is_active(ctx) || !options.is_writable() {
            return Ok(());
        }

        let bytes = serde_json::to_vec(value).map_err(CacheError::Encode)?;
        self.store
            .set(&self.storage_key(key), bytes, options)
            .await?;

        if let Err(err) = self.index.track(key, options).await {
            metrics::counter!("talentdesk_cache_index_track_error_total").increment(1);
            warn!(
                target = "talentdesk::cache::provider",
                key,
                error = %err,
                "failed to track cache key in hash index"
            );
        }
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(&self.storage_key(key)).await
    }

    /// An empty prefix flushes the whole namespace.
    pub async fn remove_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let key_prefix = self.config.snapshot().key_prefix.clone();
        let prefix = prefix.trim().trim_end_matches(':');

        if prefix.is_empty() {
            return if key_prefix.is_empty() {
                self.store.clear().await
            } else {
                self.store.remove_by_prefix(&format!("{key_prefix}:")).await
            };
        }

        self.store
            .remove_by_prefix(&namespaced(&key_prefix, prefix))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::keys::CacheKeyHasher;
    use crate::cache::store::MemoryStore;

    fn provider() -> (CacheProvider, SharedCacheConfig) {
        let config = SharedCacheConfig::default();
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new(&config.snapshot()));
        (CacheProvider::new(store, config.clone()), config)
    }

    fn minute() -> CacheEntryOptions {
        CacheEntryOptions::absolute(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn set_tracks_index_and_get_round_trips() {
        let (provider, _) = provider();
        let ctx = CacheContext::new();
        provider
            .set(&ctx, "Dashboard:Metrics", &vec![1, 2, 3], &minute())
            .await
            .expect("set");

        let cached: Option<Vec<i32>> = provider.get(&ctx, "Dashboard:Metrics").await;
        assert_eq!(cached, Some(vec![1, 2, 3]));

        let hash = CacheKeyHasher.hash("Dashboard:Metrics");
        assert_eq!(
            provider.index().try_resolve(&hash).await.as_deref(),
            Some("Dashboard:Metrics")
        );
    }

    #[tokio::test]
    async fn disabled_cache_neither_reads_nor_writes() {
        let (provider, config) = provider();
        let ctx = CacheContext::new();
        provider
            .set(&ctx, "k", &1_u8, &minute())
            .await
            .expect("set");

        config.update(|config| config.enabled = false);
        assert_eq!(provider.get::<u8>(&ctx, "k").await, None);
        provider
            .set(&ctx, "other", &2_u8, &minute())
            .await
            .expect("set");

        config.update(|config| config.enabled = true);
        assert_eq!(provider.get::<u8>(&ctx, "k").await, Some(1));
        assert_eq!(provider.get::<u8>(&ctx, "other").await, None);
    }

    #[tokio::test]
    async fn bypassed_context_skips_cache_but_others_do_not() {
        let (provider, _) = provider();
        let normal = CacheContext::new();
        provider
            .set(&normal, "k", &1_u8, &minute())
            .await
            .expect("set");

        let bypassed = CacheContext::new();
        bypassed.enable_bypass(Some("test"));
        assert_eq!(provider.get::<u8>(&bypassed, "k").await, None);
        assert_eq!(provider.get::<u8>(&normal, "k").await, Some(1));
    }

    #[tokio::test]
    async fn zero_ttl_skips_write() {
        let (provider, _) = provider();
        let ctx = CacheContext::new();
        provider
            .set(&ctx, "k", &1_u8, &CacheEntryOptions::disabled())
            .await
            .expect("set");
        assert_eq!(provider.get::<u8>(&ctx, "k").await, None);
    }

    #[tokio::test]
    async fn remove_ignores_kill_switch() {
        let (provider, config) = provider();
        let ctx = CacheContext::new();
        provider
            .set(&ctx, "k", &1_u8, &minute())
            .await
            .expect("set");

        config.update(|config| config.disable_cache = true);
        provider.remove("k").await.expect("remove");

        config.update(|config| config.disable_cache = false);
        assert_eq!(provider.get::<u8>(&ctx, "k").await, None);
    }

    #[tokio::test]
    async fn prefix_removal_and_full_flush() {
        let (provider, _) = provider();
        let ctx = CacheContext::new();
        for key in [
            "Employees:GetAll:page=1:size=10",
            "Employees:GetAll:page=2:size=10",
            "Dashboard:Metrics",
        ] {
            provider.set(&ctx, key, &0_u8, &minute()).await.expect("set");
        }

        provider
            .remove_by_prefix("Employees:GetAll:")
            .await
            .expect("prefix");
        assert_eq!(
            provider
                .get::<u8>(&ctx, "Employees:GetAll:page=1:size=10")
                .await,
            None
        );
        assert_eq!(provider.get::<u8>(&ctx, "Dashboard:Metrics").await, Some(0));

        provider.remove_by_prefix("").await.expect("flush");
        assert_eq!(provider.get::<u8>(&ctx, "Dashboard:Metrics").await, None);
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::store("broken", "connection refused"))
        }

        async fn set(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _options: &CacheEntryOptions,
        ) -> Result<(), CacheError> {
            Err(CacheError::store("broken", "connection refused"))
        }

        async fn remove(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::store("broken", "connection refused"))
        }

        async fn remove_by_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
            Err(CacheError::store("broken", "connection refused"))
        }

        async fn clear(&self) -> Result<u64, CacheError> {
            Err(CacheError::store("broken", "connection refused"))
        }
    }

    #[tokio::test]
    async fn store_failures_degrade_reads_but_surface_writes() {
        let provider = CacheProvider::new(Arc::new(BrokenStore), SharedCacheConfig::default());
        let ctx = CacheContext::new();

        assert_eq!(provider.get::<u8>(&ctx, "k").await, None);
        assert!(provider.set(&ctx, "k", &1_u8, &minute()).await.is_err());
        assert!(provider.remove("k").await.is_err());
    }

    #[tokio::test]
    async fn corrupt_payload_reads_as_miss() {
        let config = SharedCacheConfig::default();
        let store = Arc::new(MemoryStore::new(&config.snapshot()));
        store
            .set("talentdesk:k", b"not json".to_vec(), &minute())
            .await
            .expect("raw set");
        let provider = CacheProvider::new(store, config);

        assert_eq!(provider.get::<u8>(&CacheContext::new(), "k").await, None);
    }
}
