//! Repository traits for the query handlers and the mutation commands.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::fields::FieldMap;

use super::queries::{DashboardMetrics, GetEmployeesQuery, GetPositionsQuery};
use super::results::RecordsCount;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// One page of shaped rows plus the counts needed to page through the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPage {
    pub rows: Vec<FieldMap>,
    pub counts: RecordsCount,
}

#[async_trait]
pub trait EmployeesRepo: Send + Sync {
    async fn list_employees(&self, query: &GetEmployeesQuery) -> Result<RowPage, RepoError>;
}

#[async_trait]
pub trait PositionsRepo: Send + Sync {
    async fn list_positions(&self, query: &GetPositionsQuery) -> Result<RowPage, RepoError>;
}

#[async_trait]
pub trait DashboardRepo: Send + Sync {
    async fn dashboard_metrics(&self) -> Result<DashboardMetrics, RepoError>;
}

/// Write side of one aggregate. Every operation returns the affected id;
/// updating or deleting a missing row is [`RepoError::NotFound`].
#[async_trait]
pub trait AggregateWriter<I>: Send + Sync
where
    I: Send + Sync + 'static,
{
    async fn create(&self, input: &I) -> Result<Uuid, RepoError>;

    async fn update(&self, id: Uuid, input: &I) -> Result<Uuid, RepoError>;

    async fn delete(&self, id: Uuid) -> Result<Uuid, RepoError>;
}
