//! Administrative cache endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::application::error::AppError;

use super::AppState;
use super::auth::AdminPrincipal;
use super::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvalidateRequest {
    pub key: Option<String>,
    pub prefix: Option<String>,
    pub invalidate_all: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateParams {
    pub invalidate_all: Option<bool>,
}

#[derive(Debug, PartialEq, Eq)]
enum Invalidation {
    All,
    Key(String),
    Prefix(String),
}

/// `invalidateAll` wins over `key`, which wins over `prefix`.
fn resolve(body: InvalidateRequest, params: &InvalidateParams) -> Option<Invalidation> {
    let not_blank = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
    if body.invalidate_all || params.invalidate_all.unwrap_or(false) {
        return Some(Invalidation::All);
    }
    if let Some(key) = not_blank(body.key) {
        return Some(Invalidation::Key(key));
    }
    not_blank(body.prefix).map(Invalidation::Prefix)
}

pub async fn invalidate(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    Query(params): Query<InvalidateParams>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        InvalidateRequest::default()
    } else {
        serde_json::from_slice::<InvalidateRequest>(&body).map_err(|err| {
            ApiError::bad_request("Malformed invalidation request", Some(err.to_string()))
        })?
    };

    let Some(invalidation) = resolve(request, &params) else {
        return Err(ApiError::bad_request(
            "Specify a key, prefix, or set invalidateAll=true.",
            None,
        ));
    };

    let service = &state.cache.invalidation;
    let outcome = match &invalidation {
        Invalidation::All => service.invalidate_all().await,
        Invalidation::Key(key) => service.invalidate_key(key).await,
        Invalidation::Prefix(prefix) => service.invalidate_prefix(prefix).await,
    };
    outcome.map_err(|err| ApiError::from(AppError::from(err)))?;

    info!(
        target = "talentdesk::http::cache",
        admin = %principal.name,
        invalidation = ?invalidation,
        "cache invalidated on request"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub average_hit_latency_ms: f64,
    pub average_miss_latency_ms: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at_utc: OffsetDateTime,
}

pub async fn stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let snapshot = state.cache.stats.snapshot();
    Json(CacheStatsResponse {
        hits: snapshot.hits,
        misses: snapshot.misses,
        hit_rate: snapshot.hit_rate(),
        average_hit_latency_ms: snapshot.average_hit_latency_ms,
        average_miss_latency_ms: snapshot.average_miss_latency_ms,
        started_at_utc: snapshot.started_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(key: Option<&str>, prefix: Option<&str>, all: bool) -> InvalidateRequest {
        InvalidateRequest {
            key: key.map(str::to_string),
            prefix: prefix.map(str::to_string),
            invalidate_all: all,
        }
    }

    #[test]
    fn invalidate_all_takes_precedence() {
        let params = InvalidateParams::default();
        assert_eq!(
            resolve(body(Some("k"), Some("p"), true), &params),
            Some(Invalidation::All)
        );
        let params = InvalidateParams {
            invalidate_all: Some(true),
        };
        assert_eq!(
            resolve(body(Some("k"), None, false), &params),
            Some(Invalidation::All)
        );
    }

    #[test]
    fn key_beats_prefix_and_blanks_are_ignored() {
        let params = InvalidateParams::default();
        assert_eq!(
            resolve(body(Some("Dashboard:Metrics"), Some("Employees"), false), &params),
            Some(Invalidation::Key("Dashboard:Metrics".to_string()))
        );
        assert_eq!(
            resolve(body(Some("  "), Some("Employees"), false), &params),
            Some(Invalidation::Prefix("Employees".to_string()))
        );
        assert_eq!(resolve(body(None, Some(" "), false), &params), None);
    }
}
