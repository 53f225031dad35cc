//! Entry TTL policy resolution.

use std::time::Duration;

use super::config::{CacheConfig, SharedCacheConfig};

/// TTL policy for a single cache write. A zero absolute TTL means "do not write".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntryOptions {
    pub absolute_ttl: Duration,
    pub sliding_ttl: Option<Duration>,
}

impl CacheEntryOptions {
    pub const fn disabled() -> Self {
        Self {
            absolute_ttl: Duration::ZERO,
            sliding_ttl: None,
        }
    }

    pub const fn absolute(ttl: Duration) -> Self {
        Self {
            absolute_ttl: ttl,
            sliding_ttl: None,
        }
    }

    pub fn is_writable(&self) -> bool {
        !self.absolute_ttl.is_zero()
    }
}

/// Resolves per-endpoint entry options against the current configuration.
#[derive(Debug, Clone)]
pub struct EntryOptionsFactory {
    config: SharedCacheConfig,
}

impl EntryOptionsFactory {
    pub fn new(config: SharedCacheConfig) -> Self {
        Self { config }
    }

    pub fn create(&self, endpoint: &str) -> CacheEntryOptions {
        resolve_entry_options(&self.config.snapshot(), endpoint)
    }
}

pub fn resolve_entry_options(config: &CacheConfig, endpoint: &str) -> CacheEntryOptions {
    if !config.is_enabled() {
        return CacheEntryOptions::disabled();
    }

    let overrides = config.endpoint(endpoint).copied().unwrap_or_default();

    let absolute_seconds = overrides
        .absolute_seconds
        .filter(|seconds| *seconds > 0)
        .unwrap_or(config.default_ttl_seconds);
    let absolute_seconds = if absolute_seconds > 0 {
        absolute_seconds
    } else {
        config.default_ttl_floor()
    };

    let sliding_ttl = overrides
        .sliding_seconds
        .filter(|seconds| *seconds > 0)
        .map(|seconds| Duration::from_secs(seconds.unsigned_abs()));

    CacheEntryOptions {
        absolute_ttl: Duration::from_secs(absolute_seconds.unsigned_abs()),
        sliding_ttl,
    }
}
