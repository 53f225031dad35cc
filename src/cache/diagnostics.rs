use std::time::Duration;

use tracing::debug;

use super::config::{KeyDisplayMode, SharedCacheConfig};
use super::context::CacheContext;
use super::keys::CacheKeyHasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// What the client is allowed to see about one cache decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDiagnostic {
    pub status: CacheStatus,
    /// Raw logical key or its hash, depending on the effective display mode.
    pub key: String,
    pub duration: Option<Duration>,
}

impl CacheDiagnostic {
    /// Whole milliseconds, only when there is a positive duration to show.
    pub fn duration_ms(&self) -> Option<u128> {
        self.duration
            .filter(|duration| !duration.is_zero())
            .map(|duration| duration.as_millis())
    }
}

/// Records hit/miss outcomes onto the operation's context.
///
/// Purely observational: nothing here can fail or change a caching decision.
#[derive(Debug, Clone)]
pub struct CacheDiagnosticsPublisher {
    config: SharedCacheConfig,
    hasher: CacheKeyHasher,
}

impl CacheDiagnosticsPublisher {
    pub fn new(config: SharedCacheConfig) -> Self {
        Self {
            config,
            hasher: CacheKeyHasher,
        }
    }

    pub fn report_hit(&self, ctx: &CacheContext, key: &str, remaining_ttl: Option<Duration>) {
        self.report(ctx, CacheStatus::Hit, key, remaining_ttl);
    }

    pub fn report_miss(&self, ctx: &CacheContext, key: &str, duration: Option<Duration>) {
        self.report(ctx, CacheStatus::Miss, key, duration);
    }

    fn report(
        &self,
        ctx: &CacheContext,
        status: CacheStatus,
        key: &str,
        duration: Option<Duration>,
    ) {
        let config = self.config.snapshot();
        let displayed = match config.effective_key_display() {
            KeyDisplayMode::Raw => key.to_string(),
            KeyDisplayMode::Hash => self.hasher.hash(key),
        };

        debug!(
            target = "talentdesk::cache::diagnostics",
            status = status.as_str(),
            key = %displayed,
            duration_ms = duration.map(|d| d.as_millis() as u64),
            "cache lookup"
        );

        if config.diagnostics.emit_headers {
            ctx.record_diagnostic(CacheDiagnostic {
                status,
                key: displayed,
                duration,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppEnvironment;

    fn publisher(edit: impl FnOnce(&mut crate::cache::CacheConfig)) -> CacheDiagnosticsPublisher {
        let config = SharedCacheConfig::default();
        config.update(|config| {
            config.diagnostics.emit_headers = true;
            edit(config);
        });
        CacheDiagnosticsPublisher::new(config)
    }

    #[test]
    fn hashed_key_is_reported_by_default() {
        let publisher = publisher(|_| {});
        let ctx = CacheContext::new();
        publisher.report_miss(&ctx, "Dashboard:Metrics", None);

        let diagnostic = ctx.take_diagnostic().expect("diagnostic recorded");
        assert_eq!(diagnostic.status, CacheStatus::Miss);
        assert_eq!(diagnostic.key, CacheKeyHasher.hash("Dashboard:Metrics"));
        assert_eq!(diagnostic.duration_ms(), None);
    }

    #[test]
    fn raw_key_is_reported_in_development() {
        let publisher = publisher(|config| {
            config.diagnostics.key_display_mode = KeyDisplayMode::Raw;
            config.environment = AppEnvironment::Development;
        });
        let ctx = CacheContext::new();
        publisher.report_hit(&ctx, "Dashboard:Metrics", Some(Duration::from_millis(1500)));

        let diagnostic = ctx.take_diagnostic().expect("diagnostic recorded");
        assert_eq!(diagnostic.key, "Dashboard:Metrics");
        assert_eq!(diagnostic.duration_ms(), Some(1500));
    }

    #[test]
    fn nothing_is_recorded_when_headers_are_off() {
        let publisher = publisher(|config| config.diagnostics.emit_headers = false);
        let ctx = CacheContext::new();
        publisher.report_hit(&ctx, "Dashboard:Metrics", None);
        assert!(ctx.take_diagnostic().is_none());
    }
}
