//! HTTP route handlers.

pub mod app_usage;
pub mod health;
