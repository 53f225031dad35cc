//! Cache policies for the cached queries and the pipeline behavior that
//! applies them.

use async_trait::async_trait;

use crate::cache::{
    CacheContext, CacheKeyBuilder, CachePolicy, CachedPage, CachedScalar, CachedShape,
    DASHBOARD_METRICS_KEY, EMPLOYEES_PREFIX, POSITIONS_PREFIX, ReadThrough,
};
use crate::domain::fields::FieldMap;

use super::error::AppError;
use super::pipeline::{Behavior, Next, Request};
use super::queries::{
    DashboardMetrics, EmployeePage, GetDashboardMetricsQuery, GetEmployeesQuery,
    GetPositionsQuery, PositionPage,
};
use super::results::{PagedResult, QueryResult};

pub type EmployeesCaching = ReadThrough<GetEmployeesQuery, EmployeePage, CachedPage>;
pub type PositionsCaching = ReadThrough<GetPositionsQuery, PositionPage, CachedPage>;
pub type DashboardCaching =
    ReadThrough<GetDashboardMetricsQuery, QueryResult<DashboardMetrics>, CachedScalar<DashboardMetrics>>;

#[async_trait]
impl<Q, C> Behavior<Q> for ReadThrough<Q, Q::Response, C>
where
    Q: Request,
    C: CachedShape,
{
    async fn handle(
        &self,
        ctx: &CacheContext,
        query: &Q,
        next: Next<'_, Q>,
    ) -> Result<Q::Response, AppError> {
        self.execute(ctx, query, || next.run(ctx, query)).await
    }
}

pub fn employees_policy() -> CachePolicy<GetEmployeesQuery, EmployeePage, CachedPage> {
    CachePolicy {
        endpoint: EMPLOYEES_PREFIX,
        build_key: employees_key,
        is_success: page_succeeded,
        snapshot: snapshot_page,
        restore: restore_page,
    }
}

pub fn positions_policy() -> CachePolicy<GetPositionsQuery, PositionPage, CachedPage> {
    CachePolicy {
        endpoint: POSITIONS_PREFIX,
        build_key: positions_key,
        is_success: page_succeeded,
        snapshot: snapshot_page,
        restore: restore_page,
    }
}

pub fn dashboard_policy() -> CachePolicy<
    GetDashboardMetricsQuery,
    QueryResult<DashboardMetrics>,
    CachedScalar<DashboardMetrics>,
> {
    CachePolicy {
        endpoint: DASHBOARD_METRICS_KEY,
        build_key: |_| DASHBOARD_METRICS_KEY.to_string(),
        is_success: |result| result.is_success,
        snapshot: |result| result.value.clone().map(CachedScalar::new),
        restore: |cached| QueryResult::success(cached.payload),
    }
}

pub fn employees_key(query: &GetEmployeesQuery) -> String {
    CacheKeyBuilder::new(EMPLOYEES_PREFIX, query.page_number, query.page_size)
        .filter("first", query.first_name.as_deref())
        .filter("last", query.last_name.as_deref())
        .filter("email", query.email.as_deref())
        .filter("number", query.employee_number.as_deref())
        .filter("position", query.position_title.as_deref())
        .fields(query.fields.as_deref())
        .order(query.order_by.as_deref())
        .build()
}

pub fn positions_key(query: &GetPositionsQuery) -> String {
    CacheKeyBuilder::new(POSITIONS_PREFIX, query.page_number, query.page_size)
        .filter("number", query.position_number.as_deref())
        .filter("title", query.position_title.as_deref())
        .filter("department", query.department.as_deref())
        .fields(query.fields.as_deref())
        .order(query.order_by.as_deref())
        .build()
}

fn page_succeeded(page: &PagedResult<Vec<FieldMap>>) -> bool {
    page.is_success
}

// Cloning the rows detaches the cached copy from the caller's result.
fn snapshot_page(page: &PagedResult<Vec<FieldMap>>) -> Option<CachedPage> {
    let items = page.value.as_ref()?;
    Some(CachedPage {
        items: items.clone(),
        page_number: page.page_number,
        page_size: page.page_size,
        records_filtered: page.records_filtered,
        records_total: page.records_total,
        message: page.message.clone(),
        expires_at_utc: None,
    })
}

fn restore_page(cached: CachedPage) -> PagedResult<Vec<FieldMap>> {
    PagedResult {
        is_success: true,
        value: Some(cached.items),
        message: cached.message,
        errors: Vec::new(),
        page_number: cached.page_number,
        page_size: cached.page_size,
        records_filtered: cached.records_filtered,
        records_total: cached.records_total,
    }
}
