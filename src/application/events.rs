//! Change-event dispatch.
//!
//! Handlers run in registration order. Every handler sees every event even
//! when an earlier one fails; the first failure is reported to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::cache::{
    CacheInvalidationService, DASHBOARD_METRICS_KEY, EMPLOYEES_PREFIX, POSITIONS_PREFIX,
};
use crate::domain::events::{AggregateKind, ChangeEvent};

use super::error::AppError;

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &ChangeEvent) -> Result<(), AppError>;
}

#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub async fn dispatch(&self, event: &ChangeEvent) -> Result<(), AppError> {
        let mut first_error = None;
        for handler in &self.handlers {
            if let Err(err) = handler.handle(event).await {
                warn!(
                    target = "talentdesk::application::events",
                    handler = handler.name(),
                    aggregate = %event.aggregate,
                    id = %event.id,
                    error = %err,
                    "event handler failed"
                );
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Evicts cached reads affected by a change.
///
/// Employee and position changes drop every cached page of their list plus
/// the dashboard aggregate; department and salary-range changes only feed
/// the dashboard.
pub struct CacheInvalidationHandler {
    invalidation: CacheInvalidationService,
}

impl CacheInvalidationHandler {
    pub fn new(invalidation: CacheInvalidationService) -> Self {
        Self { invalidation }
    }
}

#[async_trait]
impl EventHandler for CacheInvalidationHandler {
    fn name(&self) -> &'static str {
        "cache_invalidation"
    }

    async fn handle(&self, event: &ChangeEvent) -> Result<(), AppError> {
        let list_prefix = match event.aggregate {
            AggregateKind::Employee => Some(EMPLOYEES_PREFIX),
            AggregateKind::Position => Some(POSITIONS_PREFIX),
            AggregateKind::Department | AggregateKind::SalaryRange => None,
        };

        let listed = match list_prefix {
            Some(prefix) => self.invalidation.invalidate_prefix(prefix).await,
            None => Ok(()),
        };
        let dashboard = self.invalidation.invalidate_key(DASHBOARD_METRICS_KEY).await;

        listed?;
        dashboard?;
        Ok(())
    }
}
