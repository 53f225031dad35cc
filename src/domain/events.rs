//! Change notifications raised after a successful mutation.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Employee,
    Department,
    Position,
    SalaryRange,
}

impl AggregateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateKind::Employee => "employee",
            AggregateKind::Department => "department",
            AggregateKind::Position => "position",
            AggregateKind::SalaryRange => "salary_range",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One aggregate was created, updated, or deleted. Carries only its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChangeEvent {
    pub aggregate: AggregateKind,
    pub id: Uuid,
}

impl ChangeEvent {
    pub fn employee(id: Uuid) -> Self {
        Self {
            aggregate: AggregateKind::Employee,
            id,
        }
    }

    pub fn department(id: Uuid) -> Self {
        Self {
            aggregate: AggregateKind::Department,
            id,
        }
    }

    pub fn position(id: Uuid) -> Self {
        Self {
            aggregate: AggregateKind::Position,
            id,
        }
    }

    pub fn salary_range(id: Uuid) -> Self {
        Self {
            aggregate: AggregateKind::SalaryRange,
            id,
        }
    }
}
