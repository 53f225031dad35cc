//! Terminal query handlers.
//!
//! Repository failures become failure results here; the pipeline error
//! channel is reserved for cancellation and wiring faults.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::cache::CacheContext;
use crate::domain::fields::FieldMap;

use super::error::AppError;
use super::pipeline::Handler;
use super::queries::{
    DashboardMetrics, EmployeePage, GetDashboardMetricsQuery, GetEmployeesQuery,
    GetPositionsQuery, PositionPage,
};
use super::repos::{DashboardRepo, EmployeesRepo, PositionsRepo, RepoError, RowPage};
use super::results::{PagedResult, QueryResult};

const EMPLOYEES_FAILURE: &str = "Employees could not be loaded.";
const POSITIONS_FAILURE: &str = "Positions could not be loaded.";
const DASHBOARD_FAILURE: &str = "Dashboard metrics could not be loaded.";

pub struct GetEmployeesHandler {
    repo: Arc<dyn EmployeesRepo>,
}

impl GetEmployeesHandler {
    pub fn new(repo: Arc<dyn EmployeesRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Handler<GetEmployeesQuery> for GetEmployeesHandler {
    async fn handle(
        &self,
        _ctx: &CacheContext,
        query: &GetEmployeesQuery,
    ) -> Result<EmployeePage, AppError> {
        let page = self.repo.list_employees(query).await;
        Ok(into_page(
            page,
            query.page_number,
            query.page_size,
            "employees",
            EMPLOYEES_FAILURE,
        ))
    }
}

pub struct GetPositionsHandler {
    repo: Arc<dyn PositionsRepo>,
}

impl GetPositionsHandler {
    pub fn new(repo: Arc<dyn PositionsRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Handler<GetPositionsQuery> for GetPositionsHandler {
    async fn handle(
        &self,
        _ctx: &CacheContext,
        query: &GetPositionsQuery,
    ) -> Result<PositionPage, AppError> {
        let page = self.repo.list_positions(query).await;
        Ok(into_page(
            page,
            query.page_number,
            query.page_size,
            "positions",
            POSITIONS_FAILURE,
        ))
    }
}

pub struct GetDashboardMetricsHandler {
    repo: Arc<dyn DashboardRepo>,
}

impl GetDashboardMetricsHandler {
    pub fn new(repo: Arc<dyn DashboardRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Handler<GetDashboardMetricsQuery> for GetDashboardMetricsHandler {
    async fn handle(
        &self,
        _ctx: &CacheContext,
        _query: &GetDashboardMetricsQuery,
    ) -> Result<QueryResult<DashboardMetrics>, AppError> {
        match self.repo.dashboard_metrics().await {
            Ok(metrics) => Ok(QueryResult::success(metrics)),
            Err(err) => {
                log_failure("dashboard", &err);
                Ok(QueryResult::failure(DASHBOARD_FAILURE))
            }
        }
    }
}

fn into_page(
    page: Result<RowPage, RepoError>,
    page_number: u32,
    page_size: u32,
    resource: &'static str,
    failure: &'static str,
) -> PagedResult<Vec<FieldMap>> {
    match page {
        Ok(RowPage { rows, counts }) => PagedResult::success(rows, page_number, page_size, counts),
        Err(err) => {
            log_failure(resource, &err);
            PagedResult::failure(failure, page_number, page_size)
        }
    }
}

fn log_failure(resource: &'static str, err: &RepoError) {
    error!(
        target = "talentdesk::application::handlers",
        resource,
        error = %err,
        "query failed"
    );
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::results::RecordsCount;

    struct FixedEmployees(Result<Vec<FieldMap>, ()>);

    #[async_trait]
    impl EmployeesRepo for FixedEmployees {
        async fn list_employees(&self, _query: &GetEmployeesQuery) -> Result<RowPage, RepoError> {
            match &self.0 {
                Ok(rows) => Ok(RowPage {
                    rows: rows.clone(),
                    counts: RecordsCount {
                        records_filtered: rows.len() as u64,
                        records_total: 40,
                    },
                }),
                Err(()) => Err(RepoError::Timeout),
            }
        }
    }

    #[tokio::test]
    async fn rows_become_a_successful_page() {
        let row: FieldMap = [("Id", json!(1))].into_iter().collect();
        let handler = GetEmployeesHandler::new(Arc::new(FixedEmployees(Ok(vec![row]))));
        let query = GetEmployeesQuery {
            page_number: 2,
            page_size: 5,
            ..Default::default()
        };

        let page = handler
            .handle(&CacheContext::new(), &query)
            .await
            .expect("handler");

        assert!(page.is_success);
        assert_eq!(page.page_number, 2);
        assert_eq!(page.records_filtered, 1);
        assert_eq!(page.records_total, 40);
    }

    #[tokio::test]
    async fn repository_errors_become_failure_results() {
        let handler = GetEmployeesHandler::new(Arc::new(FixedEmployees(Err(()))));
        let page = handler
            .handle(&CacheContext::new(), &GetEmployeesQuery::default())
            .await
            .expect("handler");

        assert!(!page.is_success);
        assert!(page.value.is_none());
        assert_eq!(page.message.as_deref(), Some(EMPLOYEES_FAILURE));
    }
}
