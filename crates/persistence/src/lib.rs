//! Persistence layer for the app usage backend.
//!
//! This crate contains:
//! - Database connection management (writer and read-replica pools)
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - Query metrics

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
