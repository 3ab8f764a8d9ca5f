//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod api_key;
pub mod app_usage;

pub use api_key::ApiKeyEntity;
pub use app_usage::{DeviceAppUsageEntity, UsageAggregateRow};
