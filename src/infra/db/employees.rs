use async_trait::async_trait;
use serde_json::{Value, json};
use sqlx::{Postgres, QueryBuilder};
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::{
    application::queries::{GetEmployeesQuery, requested_fields},
    application::repos::{EmployeesRepo, RepoError, RowPage},
    application::results::RecordsCount,
    domain::fields::FieldMap,
};

use super::PostgresRepositories;
use super::util::{convert_count, map_sqlx_error, order_clause, push_contains, push_page};

const EMPLOYEE_FROM: &str = " FROM employees e \
    INNER JOIN positions p ON p.id = e.position_id \
    INNER JOIN departments d ON d.id = e.department_id \
    WHERE TRUE";

const EMPLOYEE_COLUMNS: &str = "SELECT e.id, e.employee_number, e.prefix, e.first_name, \
    e.middle_name, e.last_name, e.email, e.phone, e.birthday, e.gender, \
    e.salary::float8 AS salary, e.position_id, p.position_title, e.department_id, \
    d.name AS department_name, e.created_at";

const ORDER_COLUMNS: &[(&str, &str)] = &[
    ("Id", "e.id"),
    ("EmployeeNumber", "e.employee_number"),
    ("FirstName", "e.first_name"),
    ("LastName", "e.last_name"),
    ("Email", "e.email"),
    ("Birthday", "e.birthday"),
    ("Salary", "e.salary"),
    ("PositionTitle", "p.position_title"),
    ("DepartmentName", "d.name"),
    ("Created", "e.created_at"),
];

const DEFAULT_ORDER: &str = "e.last_name ASC, e.first_name ASC, e.id ASC";

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    id: Uuid,
    employee_number: String,
    prefix: Option<String>,
    first_name: String,
    middle_name: Option<String>,
    last_name: String,
    email: String,
    phone: Option<String>,
    birthday: Option<Date>,
    gender: String,
    salary: f64,
    position_id: Uuid,
    position_title: String,
    department_id: Uuid,
    department_name: String,
    created_at: OffsetDateTime,
}

impl EmployeeRow {
    fn into_fields(self) -> FieldMap {
        let full_name = format!("{} {}", self.first_name, self.last_name);
        [
            ("Id", json!(self.id)),
            ("EmployeeNumber", json!(self.employee_number)),
            ("Prefix", json!(self.prefix)),
            ("FirstName", json!(self.first_name)),
            ("MiddleName", json!(self.middle_name)),
            ("LastName", json!(self.last_name)),
            ("FullName", json!(full_name)),
            ("Email", json!(self.email)),
            ("Phone", json!(self.phone)),
            ("Birthday", json!(self.birthday.map(|date| date.to_string()))),
            ("Gender", json!(self.gender)),
            ("Salary", json!(self.salary)),
            ("PositionId", json!(self.position_id)),
            ("PositionTitle", json!(self.position_title)),
            ("DepartmentId", json!(self.department_id)),
            ("DepartmentName", json!(self.department_name)),
            ("Created", timestamp(self.created_at)),
        ]
        .into_iter()
        .collect()
    }
}

pub(super) fn timestamp(value: OffsetDateTime) -> Value {
    value.format(&Rfc3339).map_or(Value::Null, Value::String)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &GetEmployeesQuery) {
    push_contains(qb, "e.first_name", query.first_name.as_deref());
    push_contains(qb, "e.last_name", query.last_name.as_deref());
    push_contains(qb, "e.email", query.email.as_deref());
    push_contains(qb, "e.employee_number", query.employee_number.as_deref());
    push_contains(qb, "p.position_title", query.position_title.as_deref());
}

#[async_trait]
impl EmployeesRepo for PostgresRepositories {
    async fn list_employees(&self, query: &GetEmployeesQuery) -> Result<RowPage, RepoError> {
        let mut select = QueryBuilder::<Postgres>::new(EMPLOYEE_COLUMNS);
        select.push(EMPLOYEE_FROM);
        push_filters(&mut select, query);
        select.push(" ORDER BY ");
        select.push(order_clause(
            query.order_by.as_deref(),
            ORDER_COLUMNS,
            DEFAULT_ORDER,
        ));
        push_page(&mut select, query.page_number, query.page_size);

        let rows: Vec<EmployeeRow> = select
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        count.push(EMPLOYEE_FROM);
        push_filters(&mut count, query);
        let filtered: i64 = count
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
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
