//! Bearer-token authentication for the administrative role.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::config::AdminToken;

use super::AppState;
use super::error::ApiError;

/// Authenticated caller holding the administrative role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPrincipal {
    pub name: String,
}

struct HashedToken {
    name: String,
    hash: Vec<u8>,
}

/// Configured admin tokens, kept only as SHA-256 digests.
pub struct AdminAuth {
    tokens: Vec<HashedToken>,
}

impl AdminAuth {
    pub fn new(tokens: &[AdminToken]) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|token| HashedToken {
                    name: token.name.clone(),
                    hash: hash_secret(&token.token),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Every configured token is compared so the timing does not depend on
    /// which one matched.
    pub fn authenticate(&self, presented: &str) -> Option<AdminPrincipal> {
        let hashed_input = hash_secret(presented);
        let mut matched = None;
        for token in &self.tokens {
            if token.hash.ct_eq(&hashed_input).unwrap_u8() == 1 && matched.is_none() {
                matched = Some(AdminPrincipal {
                    name: token.name.clone(),
                });
            }
        }
        matched
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

pub(super) fn extract_token(header: Option<&HeaderValue>) -> Option<&str> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?.trim();
    (!bearer.is_empty()).then_some(bearer)
}

/// Attach an [`AdminPrincipal`] when the request carries a recognised token.
///
/// Never rejects: anonymous callers continue to the public routes.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let principal = extract_token(request.headers().get(AUTHORIZATION))
        .and_then(|token| state.auth.authenticate(token));
    if let Some(principal) = principal {
        debug!(
            target = "talentdesk::http::auth",
            admin = %principal.name,
            "admin token accepted"
        );
        request.extensions_mut().insert(principal);
    }
    next.run(request).await
}

/// Gate for admin-only routes: 401 without a token, 403 with an unknown one.
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    if request.extensions().get::<AdminPrincipal>().is_some() {
        return next.run(request).await;
    }
    match extract_token(request.headers().get(AUTHORIZATION)) {
        Some(_) => ApiError::forbidden().into_response(),
        None => ApiError::unauthorized().into_response(),
    }
}
