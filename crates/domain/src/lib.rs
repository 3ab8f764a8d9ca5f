//! Domain layer for the app usage backend.
//!
//! This crate contains:
//! - Domain models (usage rows, aggregates, principals and capabilities)
//! - The app usage service and the store trait it drives
//! - Domain error types

pub mod models;
pub mod services;
