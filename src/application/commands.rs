//! Mutation side: validated inputs, the commands that persist them, and the
//! runner that turns each committed write into change events.
//!
//! Event delivery problems never turn a committed write into a failure.

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::domain::events::ChangeEvent;
use crate::domain::people::Gender;

use super::error::AppError;
use super::events::EventDispatcher;
use super::repos::{AggregateWriter, RepoError};

#[derive(Clone)]
pub struct MutationRunner {
    dispatcher: Arc<EventDispatcher>,
}

impl MutationRunner {
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Await `persist`; when it succeeds, dispatch the events `raise` derives
    /// from the persisted value. A failed write raises nothing.
    pub async fn run<T, E, Fut, F, I>(&self, persist: Fut, raise: F) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        F: FnOnce(&T) -> I,
        I: IntoIterator<Item = ChangeEvent>,
    {
        let value = persist.await?;
        for event in raise(&value) {
            if let Err(err) = self.dispatcher.dispatch(&event).await {
                error!(
                    target = "talentdesk::application::commands",
                    aggregate = %event.aggregate,
                    id = %event.id,
                    error = %err,
                    "change event dispatch failed; mutation kept"
                );
            }
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeInput {
    pub employee_number: String,
    pub prefix: Option<String>,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub salary: f64,
    pub position_id: Uuid,
    pub department_id: Uuid,
}

impl EmployeeInput {
    pub fn validate(&self) -> Result<(), AppError> {
        required("employeeNumber", &self.employee_number)?;
        required("firstName", &self.first_name)?;
        required("lastName", &self.last_name)?;
        required("email", &self.email)?;
        if !self.email.contains('@') {
            return Err(AppError::validation("email must contain '@'"));
        }
        amount("salary", self.salary)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInput {
    pub position_number: String,
    pub position_title: String,
    pub position_description: Option<String>,
    pub department_id: Uuid,
    pub salary_range_id: Uuid,
}

impl PositionInput {
    pub fn validate(&self) -> Result<(), AppError> {
        required("positionNumber", &self.position_number)?;
        required("positionTitle", &self.position_title)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentInput {
    pub name: String,
}

impl DepartmentInput {
    pub fn validate(&self) -> Result<(), AppError> {
        required("name", &self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryRangeInput {
    pub name: String,
    pub min_salary: f64,
    pub max_salary: f64,
}

impl SalaryRangeInput {
    pub fn validate(&self) -> Result<(), AppError> {
        required("name", &self.name)?;
        amount("minSalary", self.min_salary)?;
        amount("maxSalary", self.max_salary)?;
        if self.min_salary > self.max_salary {
            return Err(AppError::validation(
                "minSalary must not exceed maxSalary",
            ));
        }
        Ok(())
    }
}

fn required(field: &'static str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

fn amount(field: &'static str, value: f64) -> Result<(), AppError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "{field} must be a non-negative number"
        )))
    }
}

/// Persistence for every mutable aggregate.
#[derive(Clone)]
pub struct Writers {
    pub employees: Arc<dyn AggregateWriter<EmployeeInput>>,
    pub positions: Arc<dyn AggregateWriter<PositionInput>>,
    pub departments: Arc<dyn AggregateWriter<DepartmentInput>>,
    pub salary_ranges: Arc<dyn AggregateWriter<SalaryRangeInput>>,
}

/// Create, update and delete for each aggregate. Inputs are validated before
/// anything is written; every committed write raises one change event.
#[derive(Clone)]
pub struct Commands {
    runner: MutationRunner,
    writers: Writers,
}

impl Commands {
    pub fn new(runner: MutationRunner, writers: Writers) -> Self {
        Self { runner, writers }
    }

    pub async fn create_employee(&self, input: &EmployeeInput) -> Result<Uuid, AppError> {
        input.validate()?;
        self.apply(self.writers.employees.create(input), ChangeEvent::employee)
            .await
    }

    pub async fn update_employee(&self, id: Uuid, input: &EmployeeInput) -> Result<Uuid, AppError> {
        input.validate()?;
        self.apply(self.writers.employees.update(id, input), ChangeEvent::employee)
            .await
    }

    pub async fn delete_employee(&self, id: Uuid) -> Result<Uuid, AppError> {
        self.apply(self.writers.employees.delete(id), ChangeEvent::employee)
            .await
    }

    pub async fn create_position(&self, input: &PositionInput) -> Result<Uuid, AppError> {
        input.validate()?;
        self.apply(self.writers.positions.create(input), ChangeEvent::position)
            .await
    }

    pub async fn update_position(&self, id: Uuid, input: &PositionInput) -> Result<Uuid, AppError> {
        input.validate()?;
        self.apply(self.writers.positions.update(id, input), ChangeEvent::position)
            .await
    }

    pub async fn delete_position(&self, id: Uuid) -> Result<Uuid, AppError> {
        self.apply(self.writers.positions.delete(id), ChangeEvent::position)
            .await
    }

    pub async fn create_department(&self, input: &DepartmentInput) -> Result<Uuid, AppError> {
        input.validate()?;
        self.apply(self.writers.departments.create(input), ChangeEvent::department)
            .await
    }

    pub async fn update_department(
        &self,
        id: Uuid,
        input: &DepartmentInput,
    ) -> Result<Uuid, AppError> {
        input.validate()?;
        self.apply(
            self.writers.departments.update(id, input),
            ChangeEvent::department,
        )
        .await
    }

    pub async fn delete_department(&self, id: Uuid) -> Result<Uuid, AppError> {
        self.apply(self.writers.departments.delete(id), ChangeEvent::department)
            .await
    }

    pub async fn create_salary_range(&self, input: &SalaryRangeInput) -> Result<Uuid, AppError> {
        input.validate()?;
        self.apply(
            self.writers.salary_ranges.create(input),
            ChangeEvent::salary_range,
        )
        .await
    }

    pub async fn update_salary_range(
        &self,
        id: Uuid,
        input: &SalaryRangeInput,
    ) -> Result<Uuid, AppError> {
        input.validate()?;
        self.apply(
            self.writers.salary_ranges.update(id, input),
            ChangeEvent::salary_range,
        )
        .await
    }

    pub async fn delete_salary_range(&self, id: Uuid) -> Result<Uuid, AppError> {
        self.apply(
            self.writers.salary_ranges.delete(id),
            ChangeEvent::salary_range,
        )
        .await
    }

    async fn apply<Fut>(&self, persist: Fut, event: fn(Uuid) -> ChangeEvent) -> Result<Uuid, AppError>
    where
        Fut: Future<Output = Result<Uuid, RepoError>>,
    {
        self.runner
            .run(async { persist.await.map_err(AppError::from) }, |id| {
                [event(*id)]
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::application::events::EventHandler;

    #[derive(Default)]
    struct Collect {
        fail: bool,
        seen: Mutex<Vec<ChangeEvent>>,
    }

    #[async_trait]
    impl EventHandler for Collect {
        fn name(&self) -> &'static str {
            "collect"
        }

        async fn handle(&self, event: &ChangeEvent) -> Result<(), AppError> {
            self.seen.lock().expect("seen").push(*event);
            if self.fail {
                Err(AppError::unexpected("store offline"))
            } else {
                Ok(())
            }
        }
    }

    fn runner(handler: Arc<Collect>) -> MutationRunner {
        MutationRunner::new(Arc::new(EventDispatcher::new().register(handler)))
    }

    #[tokio::test]
    async fn successful_write_raises_its_events() {
        let handler = Arc::new(Collect::default());
        let id = Uuid::new_v4();

        let saved = runner(Arc::clone(&handler))
            .run(async { Ok::<_, AppError>(id) }, |id| {
                [ChangeEvent::employee(*id), ChangeEvent::department(*id)]
            })
            .await
            .expect("saved");

        assert_eq!(saved, id);
        assert_eq!(
            *handler.seen.lock().expect("seen"),
            vec![ChangeEvent::employee(id), ChangeEvent::department(id)]
        );
    }

    #[tokio::test]
    async fn failed_write_raises_nothing() {
        let handler = Arc::new(Collect::default());

        let result = runner(Arc::clone(&handler))
            .run(
                async { Err::<Uuid, _>(AppError::validation("duplicate email")) },
                |id| [ChangeEvent::employee(*id)],
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(handler.seen.lock().expect("seen").is_empty());
    }

    #[tokio::test]
    async fn dispatch_failure_keeps_the_mutation() {
        let handler = Arc::new(Collect {
            fail: true,
            ..Default::default()
        });
        let id = Uuid::new_v4();

        let saved = runner(Arc::clone(&handler))
            .run(async { Ok::<_, AppError>(id) }, |id| {
                [ChangeEvent::position(*id)]
            })
            .await
            .expect("mutation survives dispatch failure");

        assert_eq!(saved, id);
        assert_eq!(handler.seen.lock().expect("seen").len(), 1);
    }

    /// Writer that records what reached persistence; unknown ids are missing.
    #[derive(Default)]
    struct RecordingWriter {
        created: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl<I> AggregateWriter<I> for RecordingWriter
    where
        I: Send + Sync + 'static,
    {
        async fn create(&self, _input: &I) -> Result<Uuid, RepoError> {
            let id = Uuid::new_v4();
            self.created.lock().expect("created").push(id);
            Ok(id)
        }

        async fn update(&self, id: Uuid, _input: &I) -> Result<Uuid, RepoError> {
            self.known(id)
        }

        async fn delete(&self, id: Uuid) -> Result<Uuid, RepoError> {
            self.known(id)
        }
    }

    impl RecordingWriter {
        fn known(&self, id: Uuid) -> Result<Uuid, RepoError> {
            if self.created.lock().expect("created").contains(&id) {
                Ok(id)
            } else {
                Err(RepoError::NotFound)
            }
        }

        fn writes(&self) -> usize {
            self.created.lock().expect("created").len()
        }
    }

    fn commands(handler: Arc<Collect>) -> (Commands, Arc<RecordingWriter>) {
        let writer = Arc::new(RecordingWriter::default());
        let writers = Writers {
            employees: writer.clone(),
            positions: writer.clone(),
            departments: writer.clone(),
            salary_ranges: writer.clone(),
        };
        (Commands::new(runner(handler), writers), writer)
    }

    fn employee() -> EmployeeInput {
        EmployeeInput {
            employee_number: "E-100".to_string(),
            prefix: None,
            first_name: "Katherine".to_string(),
            middle_name: None,
            last_name: "Johnson".to_string(),
            email: "kj@example.com".to_string(),
            phone: None,
            gender: Gender::Female,
            salary: 82000.0,
            position_id: Uuid::new_v4(),
            department_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn each_command_raises_its_aggregate_event() {
        let handler = Arc::new(Collect::default());
        let (commands, _) = commands(Arc::clone(&handler));

        let employee = commands.create_employee(&employee()).await.expect("employee");
        let department = commands
            .create_department(&DepartmentInput {
                name: "Research".to_string(),
            })
            .await
            .expect("department");
        let range = commands
            .create_salary_range(&SalaryRangeInput {
                name: "Band 3".to_string(),
                min_salary: 60000.0,
                max_salary: 95000.0,
            })
            .await
            .expect("salary range");
        commands.delete_employee(employee).await.expect("delete");

        assert_eq!(
            *handler.seen.lock().expect("seen"),
            vec![
                ChangeEvent::employee(employee),
                ChangeEvent::department(department),
                ChangeEvent::salary_range(range),
                ChangeEvent::employee(employee),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_persistence() {
        let handler = Arc::new(Collect::default());
        let (commands, writer) = commands(Arc::clone(&handler));

        let mut blank = employee();
        blank.last_name = "  ".to_string();
        let inverted = SalaryRangeInput {
            name: "Band 9".to_string(),
            min_salary: 10.0,
            max_salary: 5.0,
        };

        assert!(matches!(
            commands.create_employee(&blank).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            commands.create_salary_range(&inverted).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(writer.writes(), 0);
        assert!(handler.seen.lock().expect("seen").is_empty());
    }

    #[tokio::test]
    async fn missing_row_is_not_found_and_raises_nothing() {
        let handler = Arc::new(Collect::default());
        let (commands, _) = commands(Arc::clone(&handler));

        let result = commands
            .update_position(
                Uuid::new_v4(),
                &PositionInput {
                    position_number: "P-404".to_string(),
                    position_title: "Ghost".to_string(),
                    position_description: None,
                    department_id: Uuid::new_v4(),
                    salary_range_id: Uuid::new_v4(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Repo(RepoError::NotFound))));
        assert!(handler.seen.lock().expect("seen").is_empty());
    }
}
