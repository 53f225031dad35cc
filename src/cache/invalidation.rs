use std::sync::Arc;

use tracing::info;

use super::config::SharedCacheConfig;
use super::error::CacheError;
use super::provider::CacheProvider;

/// Evicts entries by logical key, hashed key, prefix, or wholesale.
#[derive(Clone)]
pub struct CacheInvalidationService {
    provider: Arc<CacheProvider>,
    config: SharedCacheConfig,
}

impl CacheInvalidationService {
    pub fn new(provider: Arc<CacheProvider>, config: SharedCacheConfig) -> Self {
        Self { provider, config }
    }

    /// Accepts either a logical key or, while hashed keys are being shown to
    /// clients, the hash of one.
    ///
    /// An input that does not resolve through the index is removed as a
    /// logical key, so a stale or mistyped hash is silently a no-op.
    pub async fn invalidate_key(&self, key: &str) -> Result<(), CacheError> {
        let key = key.trim();
        if self.config.snapshot().uses_hashed_keys()
            && let Some(logical) = self.provider.index().try_resolve(key).await
        {
            self.provider.remove(&logical).await?;
            self.provider.index().remove(key).await?;
            record("key_hash");
            info!(
                target = "talentdesk::cache::invalidation",
                hashed_key = key,
                logical_key = %logical,
                "invalidated cache entry by hash"
            );
            return Ok(());
        }

        self.provider.remove(key).await?;
        record("key");
        info!(
            target = "talentdesk::cache::invalidation",
            logical_key = key,
            "invalidated cache entry"
        );
        Ok(())
    }

    /// Prefix eviction works on logical keys only; index entries age out.
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let removed = self.provider.remove_by_prefix(prefix).await?;
        record("prefix");
        info!(
            target = "talentdesk::cache::invalidation",
            prefix,
            removed,
            "invalidated cache prefix"
        );
        Ok(())
    }

    pub async fn invalidate_all(&self) -> Result<(), CacheError> {
        let removed = self.provider.remove_by_prefix("").await?;
        record("all");
        info!(
            target = "talentdesk::cache::invalidation",
            removed,
            "flushed cache"
        );
        Ok(())
    }
}

fn record(scope: &'static str) {
    metrics::counter!("talentdesk_cache_invalidation_total", "scope" => scope).increment(1);
}
