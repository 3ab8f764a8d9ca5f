//! Domain models for app usage.

pub mod access;
pub mod app_usage;

pub use access::{AccessDenied, ApiKeyRole, Capability, Principal};
pub use app_usage::{
    AggregateOrder, DateRange, DeviceUsageListing, DeviceUsageOrder, DeviceUsageQuery,
    MergeOutcome, MergeUsageRequest, NewUsageEntry, UsageAggregate, UsageAggregateListing,
    UsageAggregateQuery, UsageEntry,
};
