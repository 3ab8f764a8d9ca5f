//! App usage entities (database row mappings).

use chrono::NaiveDate;
use domain::models::{UsageAggregate, UsageEntry};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the device_app_usage table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceAppUsageEntity {
    pub device_id: Uuid,
    pub bundle_identifier: String,
    pub app_name: String,
    pub active_seconds: i64,
    pub usage_date: NaiveDate,
}

impl TryFrom<DeviceAppUsageEntity> for UsageEntry {
    type Error = String;

    fn try_from(entity: DeviceAppUsageEntity) -> Result<Self, Self::Error> {
        let active_seconds = u64::try_from(entity.active_seconds).map_err(|_| {
            format!(
                "negative active_seconds {} for {}",
                entity.active_seconds, entity.bundle_identifier
            )
        })?;

        Ok(UsageEntry {
            device_id: entity.device_id,
            bundle_identifier: entity.bundle_identifier,
            app_name: entity.app_name,
            active_seconds,
            usage_date: entity.usage_date,
        })
    }
}

/// One row of the per-application aggregation query.
#[derive(Debug, Clone, FromRow)]
pub struct UsageAggregateRow {
    pub bundle_identifier: String,
    pub app_name: String,
    pub total_seconds: i64,
    pub device_count: i64,
    pub avg_seconds_per_device: f64,
}

impl TryFrom<UsageAggregateRow> for UsageAggregate {
    type Error = String;

    fn try_from(row: UsageAggregateRow) -> Result<Self, Self::Error> {
        let total_seconds = u64::try_from(row.total_seconds).map_err(|_| {
            format!(
                "negative total_seconds {} for {}",
                row.total_seconds, row.bundle_identifier
            )
        })?;
        let device_count = u64::try_from(row.device_count).map_err(|_| {
            format!(
                "negative device_count {} for {}",
                row.device_count, row.bundle_identifier
            )
        })?;

        Ok(UsageAggregate {
            bundle_identifier: row.bundle_identifier,
            app_name: row.app_name,
            total_seconds,
            device_count,
            avg_seconds_per_device: row.avg_seconds_per_device,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_into_entry() {
        let device_id = Uuid::new_v4();
        let entity = DeviceAppUsageEntity {
            device_id,
            bundle_identifier: "com.apple.Safari".to_string(),
            app_name: "Safari".to_string(),
            active_seconds: 3600,
            usage_date: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
        };

        let entry = UsageEntry::try_from(entity).unwrap();
        assert_eq!(entry.device_id, device_id);
        assert_eq!(entry.active_seconds, 3600);
    }

    #[test]
    fn test_negative_seconds_rejected() {
        let entity = DeviceAppUsageEntity {
            device_id: Uuid::nil(),
            bundle_identifier: "com.apple.Safari".to_string(),
            app_name: String::new(),
            active_seconds: -1,
            usage_date: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
        };
        assert!(UsageEntry::try_from(entity).is_err());
    }

    #[test]
    fn test_aggregate_row_conversion() {
        let row = UsageAggregateRow {
            bundle_identifier: "com.apple.Safari".to_string(),
            app_name: "Safari".to_string(),
            total_seconds: 10800,
            device_count: 2,
            avg_seconds_per_device: 5400.0,
        };
        let aggregate = UsageAggregate::try_from(row).unwrap();
        assert_eq!(aggregate.total_seconds, 10800);
        assert_eq!(aggregate.device_count, 2);
        assert_eq!(aggregate.avg_seconds_per_device, 5400.0);
    }
}
