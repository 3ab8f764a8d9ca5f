//! Repository implementations for database operations.

pub mod api_key;
pub mod app_usage;

pub use api_key::ApiKeyRepository;
pub use app_usage::{AppUsageRepository, DEFAULT_MERGE_BATCH_SIZE};
