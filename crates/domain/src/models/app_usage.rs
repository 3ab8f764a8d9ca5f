//! App usage domain models.
//!
//! A usage row records how long one application was in the foreground on
//! one device during one calendar day. The natural key is
//! `(device_id, bundle_identifier, usage_date)`.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::pagination::{
    ListOptions, OrderDirection, PageLimits, PageRequest, PaginationError, SortKey,
};
use shared::validation::{validate_active_seconds, MAX_IDENTIFIER_LENGTH};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Maximum accepted length of an app name.
pub const MAX_APP_NAME_LENGTH: usize = MAX_IDENTIFIER_LENGTH;

/// A stored usage row for one device, application and day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub device_id: Uuid,
    pub bundle_identifier: String,
    /// Display name; empty when the reporter did not know it.
    pub app_name: String,
    pub active_seconds: u64,
    pub usage_date: NaiveDate,
}

/// A usage row reported for a device, before it is merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_new_entry_seconds"))]
pub struct NewUsageEntry {
    #[validate(custom(function = "shared::validation::validate_bundle_identifier"))]
    pub bundle_identifier: String,

    #[serde(default)]
    #[validate(length(max = 255, message = "App name must be at most 255 characters"))]
    pub app_name: String,

    pub usage_date: NaiveDate,

    pub active_seconds: u64,
}

fn validate_new_entry_seconds(entry: &NewUsageEntry) -> Result<(), ValidationError> {
    validate_active_seconds(entry.active_seconds)
}

/// Request payload for merging usage rows of one device.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MergeUsageRequest {
    #[validate(nested)]
    pub entries: Vec<NewUsageEntry>,
}

impl MergeUsageRequest {
    /// Returns the first `(bundle_identifier, usage_date)` pair that occurs
    /// more than once in the request.
    pub fn duplicate_key(&self) -> Option<(&str, NaiveDate)> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        self.entries
            .iter()
            .map(|e| (e.bundle_identifier.as_str(), e.usage_date))
            .find(|key| !seen.insert(*key))
    }
}

/// Result of a merge call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Rows sent to the store.
    pub merged: usize,
    /// Batches committed.
    pub batches: usize,
}

/// Usage of one application summed across devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageAggregate {
    pub bundle_identifier: String,
    pub app_name: String,
    pub total_seconds: u64,
    pub device_count: u64,
    pub avg_seconds_per_device: f64,
}

/// Inclusive calendar-day filter. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |start| date >= start)
            && self.end_date.map_or(true, |end| date <= end)
    }
}

/// Order keys accepted when listing one device's usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceUsageOrder {
    ActiveSeconds,
    UsageDate,
    BundleIdentifier,
    AppName,
}

impl SortKey for DeviceUsageOrder {
    const DEFAULT: Self = DeviceUsageOrder::ActiveSeconds;
    const DEFAULT_DIRECTION: OrderDirection = OrderDirection::Desc;

    fn parse(key: &str) -> Option<Self> {
        match key {
            "active_seconds" => Some(Self::ActiveSeconds),
            "usage_date" => Some(Self::UsageDate),
            "bundle_identifier" => Some(Self::BundleIdentifier),
            "app_name" => Some(Self::AppName),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::ActiveSeconds => "active_seconds",
            Self::UsageDate => "usage_date",
            Self::BundleIdentifier => "bundle_identifier",
            Self::AppName => "app_name",
        }
    }
}

/// Order keys accepted when aggregating usage across devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOrder {
    TotalSeconds,
    DeviceCount,
    AvgSecondsPerDevice,
    BundleIdentifier,
    AppName,
}

impl SortKey for AggregateOrder {
    const DEFAULT: Self = AggregateOrder::TotalSeconds;
    const DEFAULT_DIRECTION: OrderDirection = OrderDirection::Desc;

    fn parse(key: &str) -> Option<Self> {
        match key {
            "total_seconds" => Some(Self::TotalSeconds),
            "device_count" => Some(Self::DeviceCount),
            "avg_seconds_per_device" => Some(Self::AvgSecondsPerDevice),
            "bundle_identifier" => Some(Self::BundleIdentifier),
            "app_name" => Some(Self::AppName),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::TotalSeconds => "total_seconds",
            Self::DeviceCount => "device_count",
            Self::AvgSecondsPerDevice => "avg_seconds_per_device",
            Self::BundleIdentifier => "bundle_identifier",
            Self::AppName => "app_name",
        }
    }
}

/// Query parameters for listing one device's usage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceUsageQuery {
    #[serde(default)]
    pub page: u32,
    pub per_page: Option<u32>,
    pub order_key: Option<String>,
    pub order_direction: Option<OrderDirection>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// A device usage query with pagination and ordering resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceUsageListing {
    pub dates: DateRange,
    pub page: PageRequest<DeviceUsageOrder>,
}

impl DeviceUsageQuery {
    pub fn resolve(&self, limits: &PageLimits) -> Result<DeviceUsageListing, PaginationError> {
        let options = ListOptions {
            page: self.page,
            per_page: self.per_page,
            order_key: self.order_key.clone(),
            order_direction: self.order_direction,
        };

        Ok(DeviceUsageListing {
            dates: DateRange {
                start_date: self.start_date,
                end_date: self.end_date,
            },
            page: options.resolve(limits)?,
        })
    }
}

/// Query parameters for aggregating usage across devices.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageAggregateQuery {
    /// Restricts aggregation to devices of this team. Absent means all devices.
    pub team_id: Option<Uuid>,
    #[serde(default)]
    pub page: u32,
    pub per_page: Option<u32>,
    pub order_key: Option<String>,
    pub order_direction: Option<OrderDirection>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// An aggregation query with pagination and ordering resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageAggregateListing {
    pub team_id: Option<Uuid>,
    pub dates: DateRange,
    pub page: PageRequest<AggregateOrder>,
}

impl UsageAggregateQuery {
    pub fn resolve(&self, limits: &PageLimits) -> Result<UsageAggregateListing, PaginationError> {
        let options = ListOptions {
            page: self.page,
            per_page: self.per_page,
            order_key: self.order_key.clone(),
            order_direction: self.order_direction,
        };

        Ok(UsageAggregateListing {
            team_id: self.team_id,
            dates: DateRange {
                start_date: self.start_date,
                end_date: self.end_date,
            },
            page: options.resolve(limits)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entry(bundle: &str, day: &str, seconds: u64) -> NewUsageEntry {
        NewUsageEntry {
            bundle_identifier: bundle.to_string(),
            app_name: String::new(),
            usage_date: date(day),
            active_seconds: seconds,
        }
    }

    #[test]
    fn test_new_entry_validation() {
        assert!(entry("com.apple.Safari", "2026-02-10", 3600).validate().is_ok());
        assert!(entry("", "2026-02-10", 3600).validate().is_err());
        assert!(entry("com.apple.Safari", "2026-02-10", u64::MAX).validate().is_err());

        let mut long_name = entry("com.apple.Safari", "2026-02-10", 1);
        long_name.app_name = "x".repeat(MAX_APP_NAME_LENGTH + 1);
        assert!(long_name.validate().is_err());
    }

    #[test]
    fn test_new_entry_deserialize_without_app_name() {
        let json = r#"{"bundle_identifier":"com.apple.Safari","usage_date":"2026-02-10","active_seconds":3600}"#;
        let parsed: NewUsageEntry = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.app_name, "");
        assert_eq!(parsed.usage_date, date("2026-02-10"));
    }

    #[test]
    fn test_negative_seconds_rejected_by_deserialization() {
        let json = r#"{"bundle_identifier":"com.apple.Safari","usage_date":"2026-02-10","active_seconds":-1}"#;
        assert!(serde_json::from_str::<NewUsageEntry>(json).is_err());
    }

    #[test]
    fn test_merge_request_nested_validation() {
        let request = MergeUsageRequest {
            entries: vec![entry("com.apple.Safari", "2026-02-10", 1), entry(" ", "2026-02-10", 1)],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_merge_request_duplicate_key() {
        let request = MergeUsageRequest {
            entries: vec![
                entry("com.apple.Safari", "2026-02-10", 100),
                entry("com.apple.Safari", "2026-02-11", 100),
                entry("com.apple.Safari", "2026-02-10", 50),
            ],
        };
        assert_eq!(
            request.duplicate_key(),
            Some(("com.apple.Safari", date("2026-02-10")))
        );

        let unique = MergeUsageRequest {
            entries: vec![
                entry("com.apple.Safari", "2026-02-10", 100),
                entry("com.apple.Terminal", "2026-02-10", 100),
            ],
        };
        assert_eq!(unique.duplicate_key(), None);
    }

    #[test]
    fn test_date_range_inclusive() {
        let range = DateRange {
            start_date: Some(date("2026-02-10")),
            end_date: Some(date("2026-02-11")),
        };
        assert!(range.contains(date("2026-02-10")));
        assert!(range.contains(date("2026-02-11")));
        assert!(!range.contains(date("2026-02-09")));
        assert!(!range.contains(date("2026-02-12")));
        assert!(DateRange::default().contains(date("1970-01-01")));
    }

    #[test]
    fn test_device_usage_query_defaults() {
        let listing = DeviceUsageQuery::default()
            .resolve(&PageLimits::default())
            .unwrap();
        assert_eq!(listing.page.order, DeviceUsageOrder::ActiveSeconds);
        assert_eq!(listing.page.direction, OrderDirection::Desc);
        assert_eq!(listing.dates, DateRange::default());
    }

    #[test]
    fn test_aggregate_query_defaults_and_keys() {
        let listing = UsageAggregateQuery::default()
            .resolve(&PageLimits::default())
            .unwrap();
        assert_eq!(listing.page.order, AggregateOrder::TotalSeconds);
        assert_eq!(listing.page.direction, OrderDirection::Desc);

        let by_count = UsageAggregateQuery {
            order_key: Some("device_count".to_string()),
            ..Default::default()
        }
        .resolve(&PageLimits::default())
        .unwrap();
        assert_eq!(by_count.page.order, AggregateOrder::DeviceCount);
        assert_eq!(by_count.page.direction, OrderDirection::Asc);
    }

    #[test]
    fn test_unknown_order_key_rejected() {
        let result = DeviceUsageQuery {
            order_key: Some("total_seconds".to_string()),
            ..Default::default()
        }
        .resolve(&PageLimits::default());
        assert_eq!(
            result.unwrap_err(),
            PaginationError::UnknownOrderKey("total_seconds".to_string())
        );
    }

    #[test]
    fn test_aggregate_serialization() {
        let aggregate = UsageAggregate {
            bundle_identifier: "com.apple.Safari".to_string(),
            app_name: "Safari".to_string(),
            total_seconds: 10800,
            device_count: 2,
            avg_seconds_per_device: 5400.0,
        };
        let json = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(json["total_seconds"], 10800);
        assert_eq!(json["avg_seconds_per_device"], 5400.0);
    }
}
