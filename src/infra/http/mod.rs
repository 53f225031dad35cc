mod auth;
mod cache;
mod commands;
mod error;
mod middleware;
mod queries;

pub use auth::{AdminAuth, AdminPrincipal};
pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};
pub use middleware::{BYPASS_HEADER, RequestContext};

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Router, extract::State};
use sqlx::Error as SqlxError;

use crate::application::commands::Commands;
use crate::application::error::ErrorReport;
use crate::application::pipeline::Mediator;
use crate::cache::CacheServices;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct AppState {
    pub mediator: Arc<Mediator>,
    pub commands: Arc<Commands>,
    pub cache: CacheServices,
    pub auth: Arc<AdminAuth>,
    /// Checked by `/health`; absent when no database is configured.
    pub db: Option<Arc<PostgresRepositories>>,
}

pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/v1/cache/invalidate", post(cache::invalidate))
        .route("/api/v1/cache/stats", get(cache::stats))
        .route("/api/v1/employees", post(commands::create_employee))
        .route(
            "/api/v1/employees/{id}",
            put(commands::update_employee).delete(commands::delete_employee),
        )
        .route("/api/v1/positions", post(commands::create_position))
        .route(
            "/api/v1/positions/{id}",
            put(commands::update_position).delete(commands::delete_position),
        )
        .route("/api/v1/departments", post(commands::create_department))
        .route(
            "/api/v1/departments/{id}",
            put(commands::update_department).delete(commands::delete_department),
        )
        .route("/api/v1/salary-ranges", post(commands::create_salary_range))
        .route(
            "/api/v1/salary-ranges/{id}",
            put(commands::update_salary_range).delete(commands::delete_salary_range),
        )
        .route_layer(from_fn(auth::require_admin));

    // Outermost first: request context, auth, logging, bypass, diagnostics.
    Router::new()
        .route("/api/v1/employees", get(queries::list_employees))
        .route("/api/v1/positions", get(queries::list_positions))
        .route("/api/v1/dashboard/metrics", get(queries::dashboard_metrics))
        .merge(admin)
        .route("/health", get(health))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::cache_diagnostics,
        ))
        .layer(from_fn_with_state(state.clone(), middleware::cache_bypass))
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn_with_state(state.clone(), auth::authenticate))
        .layer(from_fn(middleware::set_request_context))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Response {
    match state.db {
        Some(db) => db_health_response(db.health_check().await),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
