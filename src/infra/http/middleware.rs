use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::cache::{CacheContext, CacheDiagnostic, DiagnosticsConfig};

use super::AppState;
use super::auth::AdminPrincipal;

pub const BYPASS_HEADER: &str = "x-debug-disable-cache";
const BYPASS_REASON: &str = "debug header";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Give each request an id and its own [`CacheContext`].
///
/// The context's token is cancelled if the request future is dropped before
/// a response is produced.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    let cancellation = CancellationToken::new();
    request.extensions_mut().insert(ctx.clone());
    request
        .extensions_mut()
        .insert(CacheContext::with_cancellation(cancellation.clone()));

    let guard = cancellation.drop_guard();
    let mut response = next.run(request).await;
    guard.disarm();

    response.extensions_mut().insert(ctx);
    response
}

/// Honour `X-Debug-Disable-Cache` for admin callers while caching is on.
pub async fn cache_bypass(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if is_truthy(request.headers().get(BYPASS_HEADER))
        && state.cache.config.snapshot().is_enabled()
        && let Some(principal) = request.extensions().get::<AdminPrincipal>()
        && let Some(ctx) = request.extensions().get::<CacheContext>()
        && ctx.enable_bypass(Some(BYPASS_REASON))
    {
        metrics::counter!("talentdesk_cache_bypass_total").increment(1);
        warn!(
            target = "talentdesk::http::cache_bypass",
            path = %request.uri().path(),
            admin = %principal.name,
            "cache bypass activated via header"
        );
    }
    next.run(request).await
}

fn is_truthy(value: Option<&HeaderValue>) -> bool {
    let Some(value) = value.and_then(|value| value.to_str().ok()) else {
        return false;
    };
    let value = value.trim();
    value.eq_ignore_ascii_case("true")
        || value == "1"
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("on")
}

/// Copy the request's cache diagnostic, if any, onto response headers.
pub async fn cache_diagnostics(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = request.extensions().get::<CacheContext>().cloned();
    let mut response = next.run(request).await;

    let config = state.cache.config.snapshot();
    if !config.diagnostics.emit_headers {
        return response;
    }
    if let Some(diagnostic) = ctx.and_then(|ctx| ctx.take_diagnostic()) {
        write_diagnostic_headers(response.headers_mut(), &config.diagnostics, &diagnostic);
    }
    response
}

fn write_diagnostic_headers(
    headers: &mut HeaderMap,
    config: &DiagnosticsConfig,
    diagnostic: &CacheDiagnostic,
) {
    insert_header(headers, &config.status_header, diagnostic.status.as_str());
    if !diagnostic.key.is_empty() {
        insert_header(headers, &config.key_header, &diagnostic.key);
    }
    if let Some(duration_ms) = diagnostic.duration_ms() {
        insert_header(headers, &config.duration_header, &duration_ms.to_string());
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => warn!(
            target = "talentdesk::http::cache_diagnostics",
            header = name,
            "skipping diagnostic header that cannot be encoded"
        ),
    }
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let admin = request
        .extensions()
        .get::<AdminPrincipal>()
        .map(|principal| principal.name.clone());

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "talentdesk::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                admin = admin.as_deref().unwrap_or(""),
                "request failed",
            );
        } else {
            warn!(
                target = "talentdesk::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                admin = admin.as_deref().unwrap_or(""),
                "client request error",
            );
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::CacheStatus;

    #[test]
    fn truthy_values_are_case_insensitive() {
        for value in ["true", "TRUE", "1", "yes", "On", " on "] {
            let header = HeaderValue::from_str(value).expect("header");
            assert!(is_truthy(Some(&header)), "{value} should be truthy");
        }
        for value in ["false", "0", "no", "", "enabled"] {
            let header = HeaderValue::from_str(value).expect("header");
            assert!(!is_truthy(Some(&header)), "{value} should not be truthy");
        }
        assert!(!is_truthy(None));
    }

    #[test]
    fn zero_duration_is_not_written() {
        let mut headers = HeaderMap::new();
        let config = DiagnosticsConfig::default();
        write_diagnostic_headers(
            &mut headers,
            &config,
            &CacheDiagnostic {
                status: CacheStatus::Miss,
                key: "ABC".to_string(),
                duration: Some(Duration::ZERO),
            },
        );
        assert_eq!(
            headers.get(config.status_header.as_str()),
            Some(&HeaderValue::from_static("MISS"))
        );
        assert_eq!(
            headers.get(config.key_header.as_str()),
            Some(&HeaderValue::from_static("ABC"))
        );
        assert!(headers.get(config.duration_header.as_str()).is_none());
    }
}
