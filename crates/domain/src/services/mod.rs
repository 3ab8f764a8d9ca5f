//! Domain services for app usage.
//!
//! Services contain business logic that operates on domain models.

pub mod access;
pub mod app_usage;

pub use access::Authorizer;
pub use app_usage::{AppUsageError, AppUsageService, AppUsageStore, StoreError};
