//! Create, update and delete for the mutable aggregates.
//!
//! Updates and deletes use `RETURNING id`, so a missing row surfaces as
//! `RowNotFound` and maps to [`RepoError::NotFound`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::commands::{
    DepartmentInput, EmployeeInput, PositionInput, SalaryRangeInput,
};
use crate::application::repos::{AggregateWriter, RepoError};

use super::PostgresRepositories;
use super::util::map_sqlx_error;

#[async_trait]
impl AggregateWriter<EmployeeInput> for PostgresRepositories {
    async fn create(&self, input: &EmployeeInput) -> Result<Uuid, RepoError> {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO employees (id, employee_number, prefix, first_name, middle_name, \
             last_name, email, phone, gender, salary, position_id, department_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, CAST($10 AS NUMERIC), $11, $12) \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(input.employee_number.trim())
        .bind(input.prefix.as_deref())
        .bind(input.first_name.trim())
        .bind(input.middle_name.as_deref())
        .bind(input.last_name.trim())
        .bind(input.email.trim())
        .bind(input.phone.as_deref())
        .bind(input.gender.as_str())
        .bind(input.salary)
        .bind(input.position_id)
        .bind(input.department_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn update(&self, id: Uuid, input: &EmployeeInput) -> Result<Uuid, RepoError> {
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE employees SET employee_number = $2, prefix = $3, first_name = $4, \
             middle_name = $5, last_name = $6, email = $7, phone = $8, gender = $9, \
             salary = CAST($10 AS NUMERIC), position_id = $11, department_id = $12, \
             updated_at = now() \
             WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(input.employee_number.trim())
        .bind(input.prefix.as_deref())
        .bind(input.first_name.trim())
        .bind(input.middle_name.as_deref())
        .bind(input.last_name.trim())
        .bind(input.email.trim())
        .bind(input.phone.as_deref())
        .bind(input.gender.as_str())
        .bind(input.salary)
        .bind(input.position_id)
        .bind(input.department_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn delete(&self, id: Uuid) -> Result<Uuid, RepoError> {
        delete_returning(self, "DELETE FROM employees WHERE id = $1 RETURNING id", id).await
    }
}

#[async_trait]
impl AggregateWriter<PositionInput> for PostgresRepositories {
    async fn create(&self, input: &PositionInput) -> Result<Uuid, RepoError> {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO positions (id, position_number, position_title, position_description, \
             department_id, salary_range_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(input.position_number.trim())
        .bind(input.position_title.trim())
        .bind(input.position_description.as_deref())
        .bind(input.department_id)
        .bind(input.salary_range_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn update(&self, id: Uuid, input: &PositionInput) -> Result<Uuid, RepoError> {
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE positions SET position_number = $2, position_title = $3, \
             position_description = $4, department_id = $5, salary_range_id = $6, \
             updated_at = now() \
             WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(input.position_number.trim())
        .bind(input.position_title.trim())
        .bind(input.position_description.as_deref())
        .bind(input.department_id)
        .bind(input.salary_range_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn delete(&self, id: Uuid) -> Result<Uuid, RepoError> {
        delete_returning(self, "DELETE FROM positions WHERE id = $1 RETURNING id", id).await
    }
}

#[async_trait]
impl AggregateWriter<DepartmentInput> for PostgresRepositories {
    async fn create(&self, input: &DepartmentInput) -> Result<Uuid, RepoError> {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO departments (id, name) VALUES ($1, $2) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn update(&self, id: Uuid, input: &DepartmentInput) -> Result<Uuid, RepoError> {
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE departments SET name = $2, updated_at = now() WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(input.name.trim())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn delete(&self, id: Uuid) -> Result<Uuid, RepoError> {
        delete_returning(self, "DELETE FROM departments WHERE id = $1 RETURNING id", id).await
    }
}

#[async_trait]
impl AggregateWriter<SalaryRangeInput> for PostgresRepositories {
    async fn create(&self, input: &SalaryRangeInput) -> Result<Uuid, RepoError> {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO salary_ranges (id, name, min_salary, max_salary) \
             VALUES ($1, $2, CAST($3 AS NUMERIC), CAST($4 AS NUMERIC)) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .bind(input.min_salary)
        .bind(input.max_salary)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn update(&self, id: Uuid, input: &SalaryRangeInput) -> Result<Uuid, RepoError> {
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE salary_ranges SET name = $2, min_salary = CAST($3 AS NUMERIC), \
             max_salary = CAST($4 AS NUMERIC), updated_at = now() \
             WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(input.min_salary)
        .bind(input.max_salary)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn delete(&self, id: Uuid) -> Result<Uuid, RepoError> {
        delete_returning(self, "DELETE FROM salary_ranges WHERE id = $1 RETURNING id", id).await
    }
}

// Rows still referenced elsewhere fail the foreign key and come back as
// `InvalidInput`.
async fn delete_returning(
    repos: &PostgresRepositories,
    statement: &'static str,
    id: Uuid,
) -> Result<Uuid, RepoError> {
    sqlx::query_scalar::<_, Uuid>(statement)
        .bind(id)
        .fetch_one(repos.pool())
        .await
        .map_err(map_sqlx_error)
}
