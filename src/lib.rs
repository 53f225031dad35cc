//! Talent management backend: cached read queries, event-driven cache
//! invalidation and the HTTP surface over them.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
