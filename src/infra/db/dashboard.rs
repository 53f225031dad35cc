use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::queries::{
    DashboardMetrics, DepartmentHeadcount, GenderDistribution, PositionHeadcount, RecentEmployee,
    SalaryRangeHeadcount,
};
use crate::application::repos::{DashboardRepo, RepoError};

use super::PostgresRepositories;
use super::util::{convert_count, map_sqlx_error};

const TOP_POSITIONS: i64 = 10;
const RECENT_EMPLOYEES: i64 = 5;

#[derive(sqlx::FromRow)]
struct TotalsRow {
    total_employees: i64,
    total_departments: i64,
    total_positions: i64,
    total_salary_ranges: i64,
    new_hires_this_month: i64,
    average_salary: f64,
}

#[derive(sqlx::FromRow)]
struct DepartmentRow {
    department_id: Uuid,
    department_name: String,
    employee_count: i64,
}

#[derive(sqlx::FromRow)]
struct PositionRow {
    position_id: Uuid,
    position_title: String,
    employee_count: i64,
}

#[derive(sqlx::FromRow)]
struct SalaryRangeRow {
    salary_range_id: Uuid,
    range_name: String,
    min_salary: f64,
    max_salary: f64,
    employee_count: i64,
}

#[derive(sqlx::FromRow)]
struct GenderRow {
    gender: String,
    employee_count: i64,
}

#[derive(sqlx::FromRow)]
struct RecentRow {
    id: Uuid,
    full_name: String,
    position_title: String,
    department_name: String,
    created_at: OffsetDateTime,
}

#[async_trait]
impl DashboardRepo for PostgresRepositories {
    async fn dashboard_metrics(&self) -> Result<DashboardMetrics, RepoError> {
        let totals: TotalsRow = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM employees) AS total_employees,
                (SELECT COUNT(*) FROM departments) AS total_departments,
                (SELECT COUNT(*) FROM positions) AS total_positions,
                (SELECT COUNT(*) FROM salary_ranges) AS total_salary_ranges,
                (SELECT COUNT(*) FROM employees
                    WHERE created_at >= date_trunc('month', now())) AS new_hires_this_month,
                (SELECT COALESCE(AVG(salary), 0)::float8 FROM employees) AS average_salary
            "#,
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let departments: Vec<DepartmentRow> = sqlx::query_as(
            r#"
            SELECT d.id AS department_id, d.name AS department_name, COUNT(*) AS employee_count
            FROM employees e
            INNER JOIN departments d ON d.id = e.department_id
            GROUP BY d.id, d.name
            ORDER BY employee_count DESC, d.name
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let positions: Vec<PositionRow> = sqlx::query_as(
            r#"
            SELECT p.id AS position_id, p.position_title, COUNT(*) AS employee_count
            FROM employees e
            INNER JOIN positions p ON p.id = e.position_id
            GROUP BY p.id, p.position_title
            ORDER BY employee_count DESC, p.position_title
            LIMIT $1
            "#,
        )
        .bind(TOP_POSITIONS)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let salary_ranges: Vec<SalaryRangeRow> = sqlx::query_as(
            r#"
            SELECT
                s.id AS salary_range_id,
                s.name AS range_name,
                s.min_salary::float8 AS min_salary,
                s.max_salary::float8 AS max_salary,
                COUNT(*) AS employee_count
            FROM employees e
            INNER JOIN positions p ON p.id = e.position_id
            INNER JOIN salary_ranges s ON s.id = p.salary_range_id
            GROUP BY s.id, s.name, s.min_salary, s.max_salary
            ORDER BY s.min_salary
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let genders: Vec<GenderRow> = sqlx::query_as(
            "SELECT gender, COUNT(*) AS employee_count FROM employees GROUP BY gender",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let recent: Vec<RecentRow> = sqlx::query_as(
            r#"
            SELECT
                e.id,
                e.first_name || ' ' || e.last_name AS full_name,
                p.position_title,
                d.name AS department_name,
                e.created_at
            FROM employees e
            INNER JOIN positions p ON p.id = e.position_id
            INNER JOIN departments d ON d.id = e.department_id
            ORDER BY e.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(RECENT_EMPLOYEES)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut gender_distribution = GenderDistribution::default();
        for row in genders {
            let count = convert_count(row.employee_count)?;
            match row.gender.as_str() {
                "male" => gender_distribution.male = count,
                "female" => gender_distribution.female = count,
                _ => {}
            }
        }

        Ok(DashboardMetrics {
            total_employees: convert_count(totals.total_employees)?,
            total_departments: convert_count(totals.total_departments)?,
            total_positions: convert_count(totals.total_positions)?,
            total_salary_ranges: convert_count(totals.total_salary_ranges)?,
            new_hires_this_month: convert_count(totals.new_hires_this_month)?,
            average_salary: totals.average_salary,
            employees_by_department: departments
                .into_iter()
                .map(|row| {
                    Ok(DepartmentHeadcount {
                        department_id: row.department_id,
                        department_name: row.department_name,
                        employee_count: convert_count(row.employee_count)?,
                    })
                })
                .collect::<Result<_, RepoError>>()?,
            employees_by_position: positions
                .into_iter()
                .map(|row| {
                    Ok(PositionHeadcount {
                        position_id: row.position_id,
                        position_title: row.position_title,
                        employee_count: convert_count(row.employee_count)?,
                    })
                })
                .collect::<Result<_, RepoError>>()?,
            employees_by_salary_range: salary_ranges
                .into_iter()
                .map(|row| {
                    Ok(SalaryRangeHeadcount {
                        salary_range_id: row.salary_range_id,
                        range_name: row.range_name,
                        min_salary: row.min_salary,
                        max_salary: row.max_salary,
                        employee_count: convert_count(row.employee_count)?,
                    })
                })
                .collect::<Result<_, RepoError>>()?,
            gender_distribution,
            recent_employees: recent
                .into_iter()
                .map(|row| RecentEmployee {
                    id: row.id,
                    full_name: row.full_name,
                    position_title: row.position_title,
                    department_name: row.department_name,
                    created_at: row.created_at,
                })
                .collect(),
        })
    }
}
