//! Cache storage backends.
//!
//! [`CacheStore`] is a plain byte-oriented key/value interface with TTLs.
//! [`MemoryStore`] keeps entries in-process behind an LRU; the PostgreSQL
//! backed store used for the distributed provider lives in
//! `infra::db::cache_store`.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use super::config::CacheConfig;
use super::error::CacheError;
use super::lock::rw_write;
use super::options::CacheEntryOptions;

const SOURCE: &str = "cache::store";

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    /// Fetch a live entry, refreshing its sliding window if it has one.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        options: &CacheEntryOptions,
    ) -> Result<(), CacheError>;

    /// Idempotent on missing keys.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every entry whose key starts with `prefix`; returns the count removed.
    async fn remove_by_prefix(&self, prefix: &str) -> Result<u64, CacheError>;

    /// Remove every entry; returns the count removed.
    async fn clear(&self) -> Result<u64, CacheError>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Instant,
    hard_deadline: Instant,
    sliding: Option<Duration>,
}

impl MemoryEntry {
    fn new(value: Vec<u8>, options: &CacheEntryOptions, now: Instant) -> Self {
        let hard_deadline = now + options.absolute_ttl;
        let expires_at = match options.sliding_ttl {
            Some(window) => (now + window).min(hard_deadline),
            None => hard_deadline,
        };
        Self {
            value,
            expires_at,
            hard_deadline,
            sliding: options.sliding_ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    fn touch(&mut self, now: Instant) {
        if let Some(window) = self.sliding {
            self.expires_at = (now + window).min(self.hard_deadline);
        }
    }
}

/// In-process store with LRU eviction and per-entry expiry.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.memory_entry_limit_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        rw_write(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_matching(&self, op: &'static str, matches: impl Fn(&str) -> bool) -> u64 {
        let mut entries = rw_write(&self.entries, SOURCE, op);
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| matches(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len() as u64
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let Some(entry) = entries.get_mut(key) else {
            return Ok(None);
        };
        if !entry.is_live(now) {
            entries.pop(key);
            return Ok(None);
        }
        entry.touch(now);
        Ok(Some(entry.value.clone()))
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
        let entry = MemoryEntry::new(value, options, Instant::now());
        let evicted = rw_write(&self.entries, SOURCE, "set").push(key.to_string(), entry);
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            metrics::counter!("talentdesk_cache_store_evict_total", "store" => "memory")
                .increment(1);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "remove").pop(key);
        Ok(())
    }

    async fn remove_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        Ok(self.remove_matching("remove_by_prefix", |key| key.starts_with(prefix)))
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        let removed = entries.len() as u64;
        entries.clear();
        Ok(removed)
    }
}
