use thiserror::Error;

/// Failures raised by cache stores and the provider on top of them.
///
/// Lookups never surface these to callers; writes and removals do.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store `{store}` failed: {message}")]
    Store {
        store: &'static str,
        message: String,
    },
    #[error("cache payload could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("cache payload could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("cache write task aborted: {0}")]
    Aborted(String),
}

impl CacheError {
    pub fn store(store: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Store {
            store,
            message: message.to_string(),
        }
    }
}

/// The operation's cancellation token fired before the cache lookup finished.
#[derive(Debug, Clone, Copy, Error)]
#[error("operation cancelled")]
pub struct Cancelled;
