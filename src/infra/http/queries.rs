//! Read endpoints backed by the cached query pipelines.

use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::application::error::ErrorReport;
use crate::application::queries::{
    DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE, GetDashboardMetricsQuery, GetEmployeesQuery,
    GetPositionsQuery, MAX_PAGE_SIZE,
};
use crate::cache::CacheContext;

use super::AppState;
use super::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeesParams {
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub employee_number: Option<String>,
    pub position_title: Option<String>,
    pub fields: Option<String>,
    pub order_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsParams {
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
    pub position_number: Option<String>,
    pub position_title: Option<String>,
    pub department: Option<String>,
    pub fields: Option<String>,
    pub order_by: Option<String>,
}

fn page_window(page_number: Option<i64>, page_size: Option<i64>) -> Result<(u32, u32), ApiError> {
    let number = page_number.unwrap_or(i64::from(DEFAULT_PAGE_NUMBER));
    let size = page_size.unwrap_or(i64::from(DEFAULT_PAGE_SIZE));

    let number = u32::try_from(number)
        .ok()
        .filter(|number| *number >= 1)
        .ok_or_else(|| {
            ApiError::bad_request(
                "Invalid paging",
                Some(format!("pageNumber must be at least 1, got {number}")),
            )
        })?;
    let size = u32::try_from(size)
        .ok()
        .filter(|size| (1..=MAX_PAGE_SIZE).contains(size))
        .ok_or_else(|| {
            ApiError::bad_request(
                "Invalid paging",
                Some(format!(
                    "pageSize must be between 1 and {MAX_PAGE_SIZE}, got {size}"
                )),
            )
        })?;
    Ok((number, size))
}

/// Blank filter values are treated as absent.
fn filter(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Serialize a result envelope; unsuccessful results become a 500 with the
/// same envelope as body.
fn envelope<T: Serialize>(source: &'static str, is_success: bool, body: T) -> Response {
    if is_success {
        return Json(body).into_response();
    }
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
    ErrorReport::from_message(
        source,
        StatusCode::INTERNAL_SERVER_ERROR,
        "query handler returned a failure result",
    )
    .attach(&mut response);
    response
}

pub async fn list_employees(
    State(state): State<AppState>,
    Extension(ctx): Extension<CacheContext>,
    Query(params): Query<EmployeesParams>,
) -> Result<Response, ApiError> {
    let (page_number, page_size) = page_window(params.page_number, params.page_size)?;
    let query = GetEmployeesQuery {
        page_number,
        page_size,
        first_name: filter(params.first_name),
        last_name: filter(params.last_name),
        email: filter(params.email),
        employee_number: filter(params.employee_number),
        position_title: filter(params.position_title),
        fields: filter(params.fields),
        order_by: filter(params.order_by),
    };

    let page = state.mediator.send(&ctx, query).await?;
    Ok(envelope(
        "infra::http::queries::employees",
        page.is_success,
        page,
    ))
}

pub async fn list_positions(
    State(state): State<AppState>,
    Extension(ctx): Extension<CacheContext>,
    Query(params): Query<PositionsParams>,
) -> Result<Response, ApiError> {
    let (page_number, page_size) = page_window(params.page_number, params.page_size)?;
    let query = GetPositionsQuery {
        page_number,
        page_size,
        position_number: filter(params.position_number),
        position_title: filter(params.position_title),
        department: filter(params.department),
        fields: filter(params.fields),
        order_by: filter(params.order_by),
    };

    let page = state.mediator.send(&ctx, query).await?;
    Ok(envelope(
        "infra::http::queries::positions",
        page.is_success,
        page,
    ))
}

pub async fn dashboard_metrics(
    State(state): State<AppState>,
    Extension(ctx): Extension<CacheContext>,
) -> Result<Response, ApiError> {
    let result = state.mediator.send(&ctx, GetDashboardMetricsQuery).await?;
    Ok(envelope(
        "infra::http::queries::dashboard",
        result.is_success,
        result,
    ))
}
