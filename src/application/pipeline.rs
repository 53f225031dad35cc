//! Request pipeline.
//!
//! Each request type gets a [`Pipeline`]: an ordered list of behaviors in
//! front of one terminal handler. Pipelines are registered with the
//! [`Mediator`] once, at composition time.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::CacheContext;

use super::error::AppError;

pub trait Request: Send + Sync + 'static {
    type Response: Send + 'static;
}

#[async_trait]
pub trait Handler<Q: Request>: Send + Sync {
    async fn handle(&self, ctx: &CacheContext, query: &Q) -> Result<Q::Response, AppError>;
}

#[async_trait]
pub trait Behavior<Q: Request>: Send + Sync {
    async fn handle(
        &self,
        ctx: &CacheContext,
        query: &Q,
        next: Next<'_, Q>,
    ) -> Result<Q::Response, AppError>;
}

/// The remainder of a pipeline, handed to each behavior.
pub struct Next<'a, Q: Request> {
    behaviors: &'a [Arc<dyn Behavior<Q>>],
    handler: &'a dyn Handler<Q>,
}

impl<'a, Q: Request> Next<'a, Q> {
    pub async fn run(self, ctx: &CacheContext, query: &Q) -> Result<Q::Response, AppError> {
        match self.behaviors.split_first() {
            Some((behavior, rest)) => {
                let next = Next {
                    behaviors: rest,
                    handler: self.handler,
                };
                behavior.handle(ctx, query, next).await
            }
            None => self.handler.handle(ctx, query).await,
        }
    }
}

pub struct Pipeline<Q: Request> {
    behaviors: Vec<Arc<dyn Behavior<Q>>>,
    handler: Arc<dyn Handler<Q>>,
}

impl<Q: Request> Pipeline<Q> {
    pub fn new(handler: Arc<dyn Handler<Q>>) -> Self {
        Self {
            behaviors: Vec::new(),
            handler,
        }
    }

    /// Append a behavior; earlier behaviors run first.
    pub fn with_behavior(mut self, behavior: Arc<dyn Behavior<Q>>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub async fn send(&self, ctx: &CacheContext, query: &Q) -> Result<Q::Response, AppError> {
        Next {
            behaviors: &self.behaviors,
            handler: self.handler.as_ref(),
        }
        .run(ctx, query)
        .await
    }
}

/// Typed map from request type to its pipeline.
#[derive(Default)]
pub struct Mediator {
    pipelines: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Mediator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the pipeline for `Q`, replacing any earlier registration.
    pub fn register<Q: Request>(mut self, pipeline: Pipeline<Q>) -> Self {
        self.pipelines.insert(TypeId::of::<Q>(), Box::new(pipeline));
        self
    }

    pub fn is_registered<Q: Request>(&self) -> bool {
        self.pipelines.contains_key(&TypeId::of::<Q>())
    }

    pub async fn send<Q: Request>(&self, ctx: &CacheContext, query: Q) -> Result<Q::Response, AppError> {
        let pipeline = self
            .pipelines
            .get(&TypeId::of::<Q>())
            .and_then(|entry| entry.downcast_ref::<Pipeline<Q>>())
            .ok_or_else(|| {
                AppError::unexpected(format!("no pipeline registered for `{}`", type_name::<Q>()))
            })?;
        pipeline.send(ctx, &query).await
    }
}
