//! Result envelopes returned by query handlers.

use serde::Serialize;

/// Outcome of a non-paged query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult<T> {
    pub is_success: bool,
    #[serde(rename = "data")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl<T> QueryResult<T> {
    pub fn success(value: T) -> Self {
        Self {
            is_success: true,
            value: Some(value),
            message: None,
            errors: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            is_success: false,
            value: None,
            errors: vec![message.clone()],
            message: Some(message),
        }
    }
}

/// Record counts accompanying a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordsCount {
    pub records_filtered: u64,
    pub records_total: u64,
}

/// Outcome of a paged query.
///
/// `value` may be absent even on success; such a result is returned to the
/// caller but never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    pub is_success: bool,
    #[serde(rename = "data")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub page_number: u32,
    pub page_size: u32,
    pub records_filtered: u64,
    pub records_total: u64,
}

impl<T> PagedResult<T> {
    pub fn success(value: T, page_number: u32, page_size: u32, counts: RecordsCount) -> Self {
        Self {
            is_success: true,
            value: Some(value),
            message: None,
            errors: Vec::new(),
            page_number,
            page_size,
            records_filtered: counts.records_filtered,
            records_total: counts.records_total,
        }
    }

    /// A success that carries no materializable data.
    pub fn empty(page_number: u32, page_size: u32) -> Self {
        Self {
            is_success: true,
            value: None,
            message: None,
            errors: Vec::new(),
            page_number,
            page_size,
            records_filtered: 0,
            records_total: 0,
        }
    }

    pub fn failure(message: impl Into<String>, page_number: u32, page_size: u32) -> Self {
        let message = message.into();
        Self {
            is_success: false,
            value: None,
            errors: vec![message.clone()],
            message: Some(message),
            page_number,
            page_size,
            records_filtered: 0,
            records_total: 0,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn counts(&self) -> RecordsCount {
        RecordsCount {
            records_filtered: self.records_filtered,
            records_total: self.records_total,
        }
    }
}
