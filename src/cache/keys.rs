//! Cache key construction.
//!
//! Logical keys follow
//! `<endpoint>:page=<n>:size=<n>[:<alias>=<value>]*[:fields=<tokens>][:order=<tokens>]`.
//! Filter values are trimmed and lower-cased and blank filters are dropped, so
//! requests that differ only in casing or whitespace share one entry. The
//! delimiters `%`, `:`, `=` and `,` are percent-encoded inside values and
//! tokens, so a value can never spell out another segment.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

pub const EMPLOYEES_PREFIX: &str = "Employees:GetAll";
pub const POSITIONS_PREFIX: &str = "Positions:GetAll";
pub const DASHBOARD_METRICS_KEY: &str = "Dashboard:Metrics";

/// Reserved namespace for hash -> logical key index entries.
pub(crate) const INDEX_NAMESPACE: &str = "__hash:";

/// Incrementally builds a normalized logical cache key.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    key: String,
}

impl CacheKeyBuilder {
    pub fn new(endpoint: &str, page_number: u32, page_size: u32) -> Self {
        Self {
            key: format!("{endpoint}:page={page_number}:size={page_size}"),
        }
    }

    /// Append `alias=value` unless the value is absent or blank.
    pub fn filter(mut self, alias: &str, value: Option<&str>) -> Self {
        if let Some(value) = value.and_then(normalize_value) {
            self.push(alias, &escape_segment(&value));
        }
        self
    }

    /// Append the requested field list as sorted, de-duplicated tokens.
    pub fn fields(mut self, fields: Option<&str>) -> Self {
        if let Some(tokens) = fields.and_then(normalize_tokens) {
            self.push("fields", &tokens);
        }
        self
    }

    /// Append the order-by clause, normalized with the same token rules as fields.
    pub fn order(mut self, order_by: Option<&str>) -> Self {
        if let Some(tokens) = order_by.and_then(normalize_tokens) {
            self.push("order", &tokens);
        }
        self
    }

    pub fn build(self) -> String {
        self.key
    }

    fn push(&mut self, alias: &str, value: &str) {
        self.key.push(':');
        self.key.push_str(alias);
        self.key.push('=');
        self.key.push_str(value);
    }
}

/// Trim and lower-case a filter value; blank input counts as absent.
pub fn normalize_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

/// Split a comma-separated list into trimmed, lower-cased, de-duplicated,
/// sorted tokens joined by `,`. Each token is escaped.
pub fn normalize_tokens(value: &str) -> Option<String> {
    let tokens: BTreeSet<String> = value
        .split(',')
        .filter_map(normalize_value)
        .map(|token| escape_segment(&token))
        .collect();

    if tokens.is_empty() {
        return None;
    }

    Some(tokens.into_iter().collect::<Vec<_>>().join(","))
}

/// Percent-encode the key grammar's delimiters; other characters pass through.
fn escape_segment(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            ',' => escaped.push_str("%2C"),
            ':' => escaped.push_str("%3A"),
            '=' => escaped.push_str("%3D"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// One-way transform of a logical key into an opaque display/index token.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheKeyHasher;

impl CacheKeyHasher {
    /// SHA-256 as upper-case hex; blank input maps to an empty string.
    pub fn hash(&self, key: &str) -> String {
        if key.trim().is_empty() {
            return String::new();
        }
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode_upper(hasher.finalize())
    }
}

/// Storage key for a logical key under the configured namespace.
pub(crate) fn namespaced(key_prefix: &str, key: &str) -> String {
    if key_prefix.is_empty() {
        key.to_string()
    } else {
        format!("{key_prefix}:{key}")
    }
}

/// Storage key of the index entry for `hash`.
pub(crate) fn index_key(key_prefix: &str, hash: &str) -> String {
    namespaced(key_prefix, &format!("{INDEX_NAMESPACE}{hash}"))
}
