//! Administrative write endpoints. Each one goes through [`Commands`], so a
//! committed write invalidates the cached reads it affects.
//!
//! [`Commands`]: crate::application::commands::Commands

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;
use uuid::Uuid;

use crate::application::commands::{
    DepartmentInput, EmployeeInput, PositionInput, SalaryRangeInput,
};

use super::AppState;
use super::auth::AdminPrincipal;
use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub id: Uuid,
}

type Created = (StatusCode, Json<MutationResponse>);

fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request("Malformed request body", Some(err.to_string())))
}

fn created(principal: &AdminPrincipal, aggregate: &'static str, id: Uuid) -> Created {
    record(principal, "create", aggregate, id);
    (StatusCode::CREATED, Json(MutationResponse { id }))
}

fn changed(
    principal: &AdminPrincipal,
    action: &'static str,
    aggregate: &'static str,
    id: Uuid,
) -> Json<MutationResponse> {
    record(principal, action, aggregate, id);
    Json(MutationResponse { id })
}

fn record(principal: &AdminPrincipal, action: &'static str, aggregate: &'static str, id: Uuid) {
    info!(
        target = "talentdesk::http::commands",
        admin = %principal.name,
        action,
        aggregate,
        id = %id,
        "mutation committed"
    );
}

pub async fn create_employee(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    body: Bytes,
) -> Result<Created, ApiError> {
    let input: EmployeeInput = parse(&body)?;
    let id = state.commands.create_employee(&input).await?;
    Ok(created(&principal, "employee", id))
}

pub async fn update_employee(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<MutationResponse>, ApiError> {
    let input: EmployeeInput = parse(&body)?;
    let id = state.commands.update_employee(id, &input).await?;
    Ok(changed(&principal, "update", "employee", id))
}

pub async fn delete_employee(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<Json<MutationResponse>, ApiError> {
    let id = state.commands.delete_employee(id).await?;
    Ok(changed(&principal, "delete", "employee", id))
}

pub async fn create_position(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    body: Bytes,
) -> Result<Created, ApiError> {
    let input: PositionInput = parse(&body)?;
    let id = state.commands.create_position(&input).await?;
    Ok(created(&principal, "position", id))
}

pub async fn update_position(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<MutationResponse>, ApiError> {
    let input: PositionInput = parse(&body)?;
    let id = state.commands.update_position(id, &input).await?;
    Ok(changed(&principal, "update", "position", id))
}

pub async fn delete_position(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<Json<MutationResponse>, ApiError> {
    let id = state.commands.delete_position(id).await?;
    Ok(changed(&principal, "delete", "position", id))
}

pub async fn create_department(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    body: Bytes,
) -> Result<Created, ApiError> {
    let input: DepartmentInput = parse(&body)?;
    let id = state.commands.create_department(&input).await?;
    Ok(created(&principal, "department", id))
}

pub async fn update_department(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<MutationResponse>, ApiError> {
    let input: DepartmentInput = parse(&body)?;
    let id = state.commands.update_department(id, &input).await?;
    Ok(changed(&principal, "update", "department", id))
}

pub async fn delete_department(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<Json<MutationResponse>, ApiError> {
    let id = state.commands.delete_department(id).await?;
    Ok(changed(&principal, "delete", "department", id))
}

pub async fn create_salary_range(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    body: Bytes,
) -> Result<Created, ApiError> {
    let input: SalaryRangeInput = parse(&body)?;
    let id = state.commands.create_salary_range(&input).await?;
    Ok(created(&principal, "salary_range", id))
}

pub async fn update_salary_range(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<MutationResponse>, ApiError> {
    let input: SalaryRangeInput = parse(&body)?;
    let id = state.commands.update_salary_range(id, &input).await?;
    Ok(changed(&principal, "update", "salary_range", id))
}

pub async fn delete_salary_range(
    State(state): State<AppState>,
    Extension(principal): Extension<AdminPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<Json<MutationResponse>, ApiError> {
    let id = state.commands.delete_salary_range(id).await?;
    Ok(changed(&principal, "delete", "salary_range", id))
}
