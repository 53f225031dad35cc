//! Per-operation cache context.
//!
//! One [`CacheContext`] is created for each inbound operation and passed
//! explicitly down the pipeline. It carries the bypass decision, the last
//! diagnostic recorded by the caching behavior, and a cancellation token.
//! Nothing here is ambient: dropping the context discards all of it.

use std::sync::{Arc, Mutex, OnceLock};

use tokio_util::sync::CancellationToken;

use super::diagnostics::CacheDiagnostic;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::context";
const UNSPECIFIED_REASON: &str = "unspecified";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bypass {
    pub reason: String,
}

#[derive(Debug, Default)]
struct Inner {
    bypass: OnceLock<Bypass>,
    diagnostic: Mutex<Option<CacheDiagnostic>>,
    cancellation: CancellationToken,
}

/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct CacheContext {
    inner: Arc<Inner>,
}

impl CacheContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancellation,
                ..Default::default()
            }),
        }
    }

    /// Turn caching off for the rest of this operation.
    ///
    /// Only the first call takes effect; returns whether this call did.
    pub fn enable_bypass(&self, reason: Option<&str>) -> bool {
        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(UNSPECIFIED_REASON)
            .to_string();
        self.inner.bypass.set(Bypass { reason }).is_ok()
    }

    pub fn is_bypassed(&self) -> bool {
        self.inner.bypass.get().is_some()
    }

    pub fn bypass(&self) -> Option<&Bypass> {
        self.inner.bypass.get()
    }

    pub(crate) fn record_diagnostic(&self, diagnostic: CacheDiagnostic) {
        *mutex_lock(&self.inner.diagnostic, SOURCE, "record_diagnostic") = Some(diagnostic);
    }

    pub fn take_diagnostic(&self) -> Option<CacheDiagnostic> {
        mutex_lock(&self.inner.diagnostic, SOURCE, "take_diagnostic").take()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }
}
