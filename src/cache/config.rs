//! Cache configuration.
//!
//! Built by [`crate::config`] from the `[cache]` section of `talentdesk.toml`
//! and held behind [`SharedCacheConfig`] so every component reads the current
//! snapshot on each call.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

use crate::config::AppEnvironment;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::config";

pub const DEFAULT_TTL_SECONDS: i64 = 60;
pub const DEFAULT_INDEX_TTL_SECONDS: i64 = 600;
pub const DEFAULT_KEY_PREFIX: &str = "talentdesk";
pub const DEFAULT_MEMORY_ENTRY_LIMIT: usize = 1024;
pub const DEFAULT_STATUS_HEADER: &str = "X-Cache-Status";
pub const DEFAULT_KEY_HEADER: &str = "X-Cache-Key";
pub const DEFAULT_DURATION_HEADER: &str = "X-Cache-Duration-Ms";

/// Floor applied whenever neither the endpoint nor the global default yields
/// a positive TTL.
pub const FALLBACK_TTL_SECONDS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheProviderKind {
    #[default]
    Memory,
    Distributed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyDisplayMode {
    Raw,
    #[default]
    Hash,
}

/// Per-endpoint TTL override, in seconds. Non-positive values count as unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointTtl {
    pub absolute_seconds: Option<i64>,
    pub sliding_seconds: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    pub emit_headers: bool,
    pub status_header: String,
    pub key_header: String,
    pub duration_header: String,
    pub key_display_mode: KeyDisplayMode,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            emit_headers: false,
            status_header: DEFAULT_STATUS_HEADER.to_string(),
            key_header: DEFAULT_KEY_HEADER.to_string(),
            duration_header: DEFAULT_DURATION_HEADER.to_string(),
            key_display_mode: KeyDisplayMode::Hash,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Master switch.
    pub enabled: bool,
    /// Operational kill switch; wins over `enabled`.
    pub disable_cache: bool,
    pub default_ttl_seconds: i64,
    pub provider: CacheProviderKind,
    pub distributed_connection_string: Option<String>,
    pub memory_entry_limit: usize,
    /// Keyed by lower-cased endpoint name.
    pub(crate) endpoints: HashMap<String, EndpointTtl>,
    /// Namespace prepended to every stored key.
    pub key_prefix: String,
    pub index_ttl_seconds: i64,
    pub diagnostics: DiagnosticsConfig,
    pub environment: AppEnvironment,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            disable_cache: false,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            provider: CacheProviderKind::Memory,
            distributed_connection_string: None,
            memory_entry_limit: DEFAULT_MEMORY_ENTRY_LIMIT,
            endpoints: HashMap::new(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            index_ttl_seconds: DEFAULT_INDEX_TTL_SECONDS,
            diagnostics: DiagnosticsConfig::default(),
            environment: AppEnvironment::Production,
        }
    }
}

impl CacheConfig {
    /// Whether caching is on at all, before any per-request bypass.
    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.disable_cache
    }

    pub fn with_endpoint(mut self, endpoint: &str, ttl: EndpointTtl) -> Self {
        self.set_endpoint(endpoint, ttl);
        self
    }

    pub fn set_endpoint(&mut self, endpoint: &str, ttl: EndpointTtl) {
        self.endpoints.insert(endpoint.to_ascii_lowercase(), ttl);
    }

    pub fn endpoint(&self, endpoint: &str) -> Option<&EndpointTtl> {
        self.endpoints.get(&endpoint.to_ascii_lowercase())
    }

    /// Global default TTL, or the fallback floor when the default is not positive.
    pub fn default_ttl_floor(&self) -> i64 {
        if self.default_ttl_seconds > 0 {
            self.default_ttl_seconds
        } else {
            FALLBACK_TTL_SECONDS
        }
    }

    /// Display mode actually in effect: raw keys are only ever shown in development.
    pub fn effective_key_display(&self) -> KeyDisplayMode {
        match (self.diagnostics.key_display_mode, self.environment) {
            (KeyDisplayMode::Raw, AppEnvironment::Development) => KeyDisplayMode::Raw,
            _ => KeyDisplayMode::Hash,
        }
    }

    /// Whether keys handed to clients are hashes that must be resolved back.
    pub fn uses_hashed_keys(&self) -> bool {
        self.effective_key_display() == KeyDisplayMode::Hash
    }

    pub fn memory_entry_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_entry_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

/// Runtime-replaceable configuration handle shared by all cache components.
#[derive(Debug, Clone)]
pub struct SharedCacheConfig {
    inner: Arc<RwLock<Arc<CacheConfig>>>,
}

impl SharedCacheConfig {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn snapshot(&self) -> Arc<CacheConfig> {
        Arc::clone(&rw_read(&self.inner, SOURCE, "snapshot"))
    }

    pub fn replace(&self, config: CacheConfig) {
        *rw_write(&self.inner, SOURCE, "replace") = Arc::new(config);
    }

    /// Apply an in-place edit to a copy of the current snapshot and publish it.
    pub fn update(&self, edit: impl FnOnce(&mut CacheConfig)) {
        let mut guard = rw_write(&self.inner, SOURCE, "update");
        let mut next = CacheConfig::clone(&guard);
        edit(&mut next);
        *guard = Arc::new(next);
    }
}

impl Default for SharedCacheConfig {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_switch_overrides_enabled_flag() {
        let config = CacheConfig {
            disable_cache: true,
            ..Default::default()
        };
        assert!(config.enabled);
        assert!(!config.is_enabled());
    }

    #[test]
    fn endpoint_lookup_ignores_case() {
        let config = CacheConfig::default().with_endpoint(
            "Employees:GetAll",
            EndpointTtl {
                absolute_seconds: Some(30),
                sliding_seconds: None,
            },
        );
        assert_eq!(
            config
                .endpoint("employees:getall")
                .and_then(|ttl| ttl.absolute_seconds),
            Some(30)
        );
    }

    #[test]
    fn raw_keys_only_surface_in_development() {
        let mut config = CacheConfig::default();
        config.diagnostics.key_display_mode = KeyDisplayMode::Raw;
        assert_eq!(config.effective_key_display(), KeyDisplayMode::Hash);

        config.environment = AppEnvironment::Development;
        assert_eq!(config.effective_key_display(), KeyDisplayMode::Raw);
        assert!(!config.uses_hashed_keys());
    }

    #[test]
    fn shared_config_update_is_visible_to_later_snapshots() {
        let shared = SharedCacheConfig::default();
        let before = shared.snapshot();
        shared.update(|config| config.disable_cache = true);

        assert!(before.is_enabled());
        assert!(!shared.snapshot().is_enabled());
    }
}
