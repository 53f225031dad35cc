use async_trait::async_trait;
use serde_json::json;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::queries::{GetPositionsQuery, requested_fields},
    application::repos::{PositionsRepo, RepoError, RowPage},
    application::results::RecordsCount,
    domain::fields::FieldMap,
};

use super::PostgresRepositories;
use super::employees::timestamp;
use super::util::{convert_count, map_sqlx_error, order_clause, push_contains, push_page};

const POSITION_FROM: &str = " FROM positions p \
    INNER JOIN departments d ON d.id = p.department_id \
    INNER JOIN salary_ranges s ON s.id = p.salary_range_id \
    WHERE TRUE";

const POSITION_COLUMNS: &str = "SELECT p.id, p.position_number, p.position_title, \
    p.position_description, p.department_id, d.name AS department_name, p.salary_range_id, \
    s.name AS salary_range_name, s.min_salary::float8 AS min_salary, \
    s.max_salary::float8 AS max_salary, p.created_at";

const ORDER_COLUMNS: &[(&str, &str)] = &[
    ("Id", "p.id"),
    ("PositionNumber", "p.position_number"),
    ("PositionTitle", "p.position_title"),
    ("DepartmentName", "d.name"),
    ("Department", "d.name"),
    ("MinSalary", "s.min_salary"),
    ("MaxSalary", "s.max_salary"),
    ("Created", "p.created_at"),
];

const DEFAULT_ORDER: &str = "p.position_number ASC, p.id ASC";

#[derive(sqlx::FromRow)]
struct PositionRow {
    id: Uuid,
    position_number: String,
    position_title: String,
    position_description: Option<String>,
    department_id: Uuid,
    department_name: String,
    salary_range_id: Uuid,
    salary_range_name: String,
    min_salary: f64,
    max_salary: f64,
    created_at: OffsetDateTime,
}

impl PositionRow {
    fn into_fields(self) -> FieldMap {
        [
            ("Id", json!(self.id)),
            ("PositionNumber", json!(self.position_number)),
            ("PositionTitle", json!(self.position_title)),
            ("PositionDescription", json!(self.position_description)),
            ("DepartmentId", json!(self.department_id)),
            ("DepartmentName", json!(self.department_name)),
            ("SalaryRangeId", json!(self.salary_range_id)),
            ("SalaryRangeName", json!(self.salary_range_name)),
            ("MinSalary", json!(self.min_salary)),
            ("MaxSalary", json!(self.max_salary)),
            ("Created", timestamp(self.created_at)),
        ]
        .into_iter()
        .collect()
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &GetPositionsQuery) {
    push_contains(qb, "p.position_number", query.position_number.as_deref());
    push_contains(qb, "p.position_title", query.position_title.as_deref());
    push_contains(qb, "d.name", query.department.as_deref());
}

#[async_trait]
impl PositionsRepo for PostgresRepositories {
    async fn list_positions(&self, query: &GetPositionsQuery) -> Result<RowPage, RepoError> {
        let mut select = QueryBuilder::<Postgres>::new(POSITION_COLUMNS);
        select.push(POSITION_FROM);
        push_filters(&mut select, query);
        select.push(" ORDER BY ");
        select.push(order_clause(
            query.order_by.as_deref(),
            ORDER_COLUMNS,
            DEFAULT_ORDER,
        ));
        push_page(&mut select, query.page_number, query.page_size);

        let rows: Vec<PositionRow> = select
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        count.push(POSITION_FROM);
        push_filters(&mut count, query);
        let filtered: i64 = count
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM positions")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let fields = requested_fields(query.fields.as_deref());
        Ok(RowPage {
            rows: rows
                .into_iter()
                .map(|row| row.into_fields().project(&fields))
                .collect(),
            counts: RecordsCount {
                records_filtered: convert_count(filtered)?,
                records_total: convert_count(total)?,
            },
        })
    }
}
