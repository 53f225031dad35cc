//! Application layer: queries, their handlers, the request pipeline and the
//! mutation side's event plumbing.

pub mod caching;
pub mod commands;
pub mod error;
pub mod events;
pub mod handlers;
pub mod pipeline;
pub mod queries;
pub mod repos;
pub mod results;

use std::sync::Arc;

use crate::cache::{CacheServices, ReadThrough};

use self::caching::{dashboard_policy, employees_policy, positions_policy};
use self::commands::{Commands, MutationRunner, Writers};
use self::events::{CacheInvalidationHandler, EventDispatcher};
use self::handlers::{GetDashboardMetricsHandler, GetEmployeesHandler, GetPositionsHandler};
use self::pipeline::{Mediator, Pipeline};
use self::queries::{GetDashboardMetricsQuery, GetEmployeesQuery, GetPositionsQuery};
use self::repos::{DashboardRepo, EmployeesRepo, PositionsRepo};

/// Repository handles the query handlers read through.
#[derive(Clone)]
pub struct Repositories {
    pub employees: Arc<dyn EmployeesRepo>,
    pub positions: Arc<dyn PositionsRepo>,
    pub dashboard: Arc<dyn DashboardRepo>,
}

/// Compose the query pipelines: each cached query gets its read-through
/// behavior in front of the terminal handler.
pub fn build_mediator(repos: Repositories, cache: &CacheServices) -> Mediator {
    let employees = Pipeline::<GetEmployeesQuery>::new(Arc::new(GetEmployeesHandler::new(
        repos.employees,
    )))
    .with_behavior(Arc::new(ReadThrough::new(employees_policy(), cache.clone())));

    let positions = Pipeline::<GetPositionsQuery>::new(Arc::new(GetPositionsHandler::new(
        repos.positions,
    )))
    .with_behavior(Arc::new(ReadThrough::new(positions_policy(), cache.clone())));

    let dashboard = Pipeline::<GetDashboardMetricsQuery>::new(Arc::new(
        GetDashboardMetricsHandler::new(repos.dashboard),
    ))
    .with_behavior(Arc::new(ReadThrough::new(dashboard_policy(), cache.clone())));

    Mediator::new()
        .register(employees)
        .register(positions)
        .register(dashboard)
}

/// Compose the mutation side: every committed write is followed by cache
/// invalidation for the affected reads.
pub fn build_commands(writers: Writers, cache: &CacheServices) -> Commands {
    let dispatcher = EventDispatcher::new().register(Arc::new(CacheInvalidationHandler::new(
        cache.invalidation.clone(),
    )));
    Commands::new(MutationRunner::new(Arc::new(dispatcher)), writers)
}
