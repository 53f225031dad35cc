//! Reverse index from hashed keys back to logical keys.
//!
//! Entries live in the store's reserved `__hash:` namespace and outlive the
//! data entries they point at, so a hash shown to a client stays resolvable
//! for at least as long as the entry itself.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::config::{CacheConfig, SharedCacheConfig};
use super::error::CacheError;
use super::keys::{CacheKeyHasher, index_key};
use super::options::CacheEntryOptions;
use super::store::CacheStore;

#[derive(Clone)]
pub struct CacheKeyIndex {
    store: Arc<dyn CacheStore>,
    config: SharedCacheConfig,
    hasher: CacheKeyHasher,
}

impl CacheKeyIndex {
    pub fn new(store: Arc<dyn CacheStore>, config: SharedCacheConfig) -> Self {
        Self {
            store,
            config,
            hasher: CacheKeyHasher,
        }
    }

    /// Record `hash(logical_key) -> logical_key`. Blank keys are ignored.
    pub async fn track(
        &self,
        logical_key: &str,
        options: &CacheEntryOptions,
    ) -> Result<(), CacheError> {
        let hash = self.hasher.hash(logical_key);
        if hash.is_empty() {
            return Ok(());
        }
        let config = self.config.snapshot();
        let ttl = CacheEntryOptions::absolute(index_ttl(&config, options));
        self.store
            .set(
                &index_key(&config.key_prefix, &hash),
                logical_key.as_bytes().to_vec(),
                &ttl,
            )
            .await
    }

    /// Look up the logical key for `hashed_key`. Store failures read as absent.
    pub async fn try_resolve(&self, hashed_key: &str) -> Option<String> {
        let hashed_key = canonical_hash(hashed_key);
        if hashed_key.is_empty() {
            return None;
        }
        let config = self.config.snapshot();
        let storage_key = index_key(&config.key_prefix, &hashed_key);
        match self.store.get(&storage_key).await {
            Ok(Some(bytes)) => String::from_utf8(bytes).ok(),
            Ok(None) => None,
            Err(err) => {
                warn!(
                    target = "talentdesk::cache::index",
                    hashed_key = %hashed_key,
                    error = %err,
                    "index lookup failed; treating as unresolved"
                );
                None
            }
        }
    }

    pub async fn remove(&self, hashed_key: &str) -> Result<(), CacheError> {
        let hashed_key = canonical_hash(hashed_key);
        if hashed_key.is_empty() {
            return Ok(());
        }
        let config = self.config.snapshot();
        self.store
            .remove(&index_key(&config.key_prefix, &hashed_key))
            .await
    }
}

/// Hashes are stored as upper-case hex; accept any casing from clients.
fn canonical_hash(input: &str) -> String {
    let input = input.trim();
    if input.chars().all(|c| c.is_ascii_hexdigit()) {
        input.to_ascii_uppercase()
    } else {
        input.to_string()
    }
}

/// `max(ceil(entry ttl), configured index ttl)`, each falling back to the
/// default floor when not positive.
pub fn index_ttl(config: &CacheConfig, options: &CacheEntryOptions) -> Duration {
    let floor = config.default_ttl_floor().unsigned_abs();

    let entry_seconds = ceil_seconds(options.absolute_ttl);
    let entry_seconds = if entry_seconds > 0 {
        entry_seconds
    } else {
        floor
    };

    let index_seconds = if config.index_ttl_seconds > 0 {
        config.index_ttl_seconds.unsigned_abs()
    } else {
        floor
    };

    Duration::from_secs(entry_seconds.max(index_seconds))
}

fn ceil_seconds(duration: Duration) -> u64 {
    let whole = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        whole + 1
    } else {
        whole
    }
}
