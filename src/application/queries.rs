//! Query objects and their response types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::fields::FieldMap;

use super::pipeline::Request;
use super::results::{PagedResult, QueryResult};

pub const DEFAULT_PAGE_NUMBER: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 200;

/// Page of shaped employee rows.
pub type EmployeePage = PagedResult<Vec<FieldMap>>;
/// Page of shaped position rows.
pub type PositionPage = PagedResult<Vec<FieldMap>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetEmployeesQuery {
    pub page_number: u32,
    pub page_size: u32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub employee_number: Option<String>,
    pub position_title: Option<String>,
    /// Comma-separated projection; empty selects every field.
    pub fields: Option<String>,
    pub order_by: Option<String>,
}

impl Default for GetEmployeesQuery {
    fn default() -> Self {
        Self {
            page_number: DEFAULT_PAGE_NUMBER,
            page_size: DEFAULT_PAGE_SIZE,
            first_name: None,
            last_name: None,
            email: None,
            employee_number: None,
            position_title: None,
            fields: None,
            order_by: None,
        }
    }
}

impl Request for GetEmployeesQuery {
    type Response = EmployeePage;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPositionsQuery {
    pub page_number: u32,
    pub page_size: u32,
    pub position_number: Option<String>,
    pub position_title: Option<String>,
    pub department: Option<String>,
    pub fields: Option<String>,
    pub order_by: Option<String>,
}

impl Default for GetPositionsQuery {
    fn default() -> Self {
        Self {
            page_number: DEFAULT_PAGE_NUMBER,
            page_size: DEFAULT_PAGE_SIZE,
            position_number: None,
            position_title: None,
            department: None,
            fields: None,
            order_by: None,
        }
    }
}

impl Request for GetPositionsQuery {
    type Response = PositionPage;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetDashboardMetricsQuery;

impl Request for GetDashboardMetricsQuery {
    type Response = QueryResult<DashboardMetrics>;
}

/// Split a comma-separated field list into trimmed, non-empty names.
pub fn requested_fields(fields: Option<&str>) -> Vec<&str> {
    fields
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_employees: u64,
    pub total_departments: u64,
    pub total_positions: u64,
    pub total_salary_ranges: u64,
    pub new_hires_this_month: u64,
    pub average_salary: f64,
    pub employees_by_department: Vec<DepartmentHeadcount>,
    pub employees_by_position: Vec<PositionHeadcount>,
    pub employees_by_salary_range: Vec<SalaryRangeHeadcount>,
    pub gender_distribution: GenderDistribution,
    pub recent_employees: Vec<RecentEmployee>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentHeadcount {
    pub department_id: Uuid,
    pub department_name: String,
    pub employee_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionHeadcount {
    pub position_id: Uuid,
    pub position_title: String,
    pub employee_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryRangeHeadcount {
    pub salary_range_id: Uuid,
    pub range_name: String,
    pub min_salary: f64,
    pub max_salary: f64,
    pub employee_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderDistribution {
    pub male: u64,
    pub female: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEmployee {
    pub id: Uuid,
    pub full_name: String,
    pub position_title: String,
    pub department_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_fields_drops_blanks() {
        assert_eq!(
            requested_fields(Some(" Id, ,FirstName ,")),
            vec!["Id", "FirstName"]
        );
        assert!(requested_fields(None).is_empty());
    }
}
