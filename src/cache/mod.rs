//! Read-through query cache.
//!
//! List and dashboard queries are served from a key/value store when a
//! fresh entry exists and populate it on a successful miss. Mutations evict
//! affected entries through [`CacheInvalidationService`].
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! default_ttl_seconds = 60
//! provider = "memory"          # or "distributed"
//! key_prefix = "talentdesk"
//! index_ttl_seconds = 600
//!
//! [cache.endpoints."Employees:GetAll"]
//! absolute_seconds = 120
//! sliding_seconds = 30
//!
//! [cache.diagnostics]
//! emit_headers = true
//! key_display_mode = "hash"    # raw keys are only shown in development
//! ```

mod behavior;
mod config;
mod context;
mod diagnostics;
mod error;
mod index;
mod invalidation;
mod keys;
mod lock;
mod options;
mod provider;
mod stats;
mod store;

use std::sync::Arc;

pub use behavior::{CachePolicy, CachedPage, CachedScalar, CachedShape, ReadThrough};
pub use config::{
    CacheConfig, CacheProviderKind, DiagnosticsConfig, EndpointTtl, KeyDisplayMode,
    SharedCacheConfig,
};
pub use context::{Bypass, CacheContext};
pub use diagnostics::{CacheDiagnostic, CacheDiagnosticsPublisher, CacheStatus};
pub use error::{CacheError, Cancelled};
pub use index::{CacheKeyIndex, index_ttl};
pub use invalidation::CacheInvalidationService;
pub use keys::{
    CacheKeyBuilder, CacheKeyHasher, DASHBOARD_METRICS_KEY, EMPLOYEES_PREFIX, POSITIONS_PREFIX,
    normalize_tokens, normalize_value,
};
pub use options::{CacheEntryOptions, EntryOptionsFactory, resolve_entry_options};
pub use provider::CacheProvider;
pub use stats::{CacheStatsCollector, CacheStatsSnapshot};
pub use store::{CacheStore, MemoryStore};

/// The cache components, wired against one store and one configuration.
#[derive(Clone)]
pub struct CacheServices {
    pub config: SharedCacheConfig,
    pub provider: Arc<CacheProvider>,
    pub options: EntryOptionsFactory,
    pub diagnostics: CacheDiagnosticsPublisher,
    pub stats: Arc<CacheStatsCollector>,
    pub invalidation: CacheInvalidationService,
}

impl CacheServices {
    pub fn new(config: SharedCacheConfig, store: Arc<dyn CacheStore>) -> Self {
        let provider = Arc::new(CacheProvider::new(store, config.clone()));
        Self {
            options: EntryOptionsFactory::new(config.clone()),
            diagnostics: CacheDiagnosticsPublisher::new(config.clone()),
            stats: Arc::new(CacheStatsCollector::new()),
            invalidation: CacheInvalidationService::new(Arc::clone(&provider), config.clone()),
            provider,
            config,
        }
    }

    /// In-process services, mostly for tests and single-node deployments.
    pub fn in_memory(config: CacheConfig) -> Self {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new(&config));
        Self::new(SharedCacheConfig::new(config), store)
    }
}
