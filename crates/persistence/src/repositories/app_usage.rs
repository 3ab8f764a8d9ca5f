//! App usage repository.
//!
//! Writes go to the primary pool in fixed-size batches, each batch its own
//! statement. A failing batch leaves earlier batches committed. Reads go to
//! the reader pool, which may be a replica.

use std::collections::HashMap;

use chrono::NaiveDate;
use domain::models::{
    DateRange, DeviceUsageListing, MergeOutcome, NewUsageEntry, UsageAggregate,
    UsageAggregateListing, UsageEntry,
};
use domain::services::{AppUsageStore, StoreError};
use shared::pagination::{Page, SortKey};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::DatabasePools;
use crate::entities::{DeviceAppUsageEntity, UsageAggregateRow};
use crate::metrics::{record_rows_merged, QueryTimer};

/// Rows per merge statement.
pub const DEFAULT_MERGE_BATCH_SIZE: usize = 500;

/// Repository for app usage data.
#[derive(Debug, Clone)]
pub struct AppUsageRepository {
    writer: PgPool,
    reader: PgPool,
    batch_size: usize,
}

impl AppUsageRepository {
    /// Create a repository that reads and writes through one pool.
    pub fn new(pool: PgPool) -> Self {
        Self::with_pools(DatabasePools::single(pool))
    }

    /// Create a repository over separate writer and reader pools.
    pub fn with_pools(pools: DatabasePools) -> Self {
        Self {
            writer: pools.writer,
            reader: pools.reader,
            batch_size: DEFAULT_MERGE_BATCH_SIZE,
        }
    }

    /// Overrides the merge batch size. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Collapses entries sharing `(bundle_identifier, usage_date)`, keeping the
/// last occurrence in its original position.
fn dedupe_last_wins(entries: &[NewUsageEntry]) -> Vec<&NewUsageEntry> {
    let mut last: HashMap<(&str, NaiveDate), usize> = HashMap::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        last.insert((entry.bundle_identifier.as_str(), entry.usage_date), index);
    }

    entries
        .iter()
        .enumerate()
        .filter(|(index, entry)| {
            last.get(&(entry.bundle_identifier.as_str(), entry.usage_date)) == Some(index)
        })
        .map(|(_, entry)| entry)
        .collect()
}

/// A merge row with seconds already narrowed to the column type.
struct MergeRow<'a> {
    entry: &'a NewUsageEntry,
    active_seconds: i64,
}

fn merge_batch_query(device_id: Uuid, batch: &[MergeRow<'_>]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "INSERT INTO device_app_usage \
         (device_id, bundle_identifier, app_name, active_seconds, usage_date) ",
    );

    builder.push_values(batch, |mut row, merge| {
        row.push_bind(device_id)
            .push_bind(merge.entry.bundle_identifier.clone())
            .push_bind(merge.entry.app_name.clone())
            .push_bind(merge.active_seconds)
            .push_bind(merge.entry.usage_date);
    });

    builder.push(
        " ON CONFLICT (device_id, bundle_identifier, usage_date) DO UPDATE SET \
         app_name = EXCLUDED.app_name, \
         active_seconds = EXCLUDED.active_seconds, \
         updated_at = NOW()",
    );

    builder
}

fn push_date_range(builder: &mut QueryBuilder<'static, Postgres>, column: &str, dates: &DateRange) {
    if let Some(start) = dates.start_date {
        builder.push(" AND ").push(column).push(" >= ").push_bind(start);
    }
    if let Some(end) = dates.end_date {
        builder.push(" AND ").push(column).push(" <= ").push_bind(end);
    }
}

fn device_usage_query(device_id: Uuid, listing: &DeviceUsageListing) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT device_id, bundle_identifier, app_name, active_seconds, usage_date \
         FROM device_app_usage WHERE device_id = ",
    );
    builder.push_bind(device_id);
    push_date_range(&mut builder, "usage_date", &listing.dates);

    let page = &listing.page;
    builder
        .push(" ORDER BY ")
        .push(page.order.column())
        .push(" ")
        .push(page.direction.as_sql())
        .push(", usage_date DESC, bundle_identifier ASC LIMIT ")
        .push_bind(page.fetch_limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    builder
}

fn aggregate_query(listing: &UsageAggregateListing) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT u.bundle_identifier, \
         (ARRAY_AGG(u.app_name ORDER BY u.updated_at DESC, u.usage_date DESC, u.device_id))[1] AS app_name, \
         SUM(u.active_seconds)::BIGINT AS total_seconds, \
         COUNT(DISTINCT u.device_id) AS device_count, \
         SUM(u.active_seconds)::DOUBLE PRECISION / COUNT(DISTINCT u.device_id) AS avg_seconds_per_device \
         FROM device_app_usage u",
    );

    if let Some(team_id) = listing.team_id {
        builder
            .push(" JOIN devices d ON d.id = u.device_id AND d.team_id = ")
            .push_bind(team_id);
    }

    builder.push(" WHERE TRUE");
    push_date_range(&mut builder, "u.usage_date", &listing.dates);

    let page = &listing.page;
    builder
        .push(" GROUP BY u.bundle_identifier ORDER BY ")
        .push(page.order.column())
        .push(" ")
        .push(page.direction.as_sql())
        .push(", bundle_identifier ASC LIMIT ")
        .push_bind(page.fetch_limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    builder
}

#[async_trait::async_trait]
impl AppUsageStore for AppUsageRepository {
    async fn merge_usage(
        &self,
        device_id: Uuid,
        entries: &[NewUsageEntry],
    ) -> Result<MergeOutcome, StoreError> {
        let rows = dedupe_last_wins(entries)
            .into_iter()
            .map(|entry| {
                i64::try_from(entry.active_seconds)
                    .map(|active_seconds| MergeRow {
                        entry,
                        active_seconds,
                    })
                    .map_err(|_| StoreError::OutOfRange {
                        operation: "merge_app_usage",
                        detail: format!(
                            "active_seconds {} for {}",
                            entry.active_seconds, entry.bundle_identifier
                        ),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Ok(MergeOutcome::default());
        }

        let batches = rows.len().div_ceil(self.batch_size);
        let mut committed_rows = 0;

        for (index, batch) in rows.chunks(self.batch_size).enumerate() {
            let timer = QueryTimer::new("merge_app_usage_batch");
            let result = merge_batch_query(device_id, batch)
                .build()
                .execute(&self.writer)
                .await;
            timer.record();

            if let Err(source) = result {
                record_rows_merged(committed_rows);
                warn!(
                    device_id = %device_id,
                    batch = index + 1,
                    batches,
                    committed_rows,
                    error = %source,
                    "App usage merge batch failed"
                );
                return Err(StoreError::MergeBatch {
                    batch: index + 1,
                    batches,
                    committed_rows,
                    source,
                });
            }

            committed_rows += batch.len();
            debug!(
                device_id = %device_id,
                batch = index + 1,
                batches,
                rows = batch.len(),
                "Merged app usage batch"
            );
        }

        record_rows_merged(committed_rows);

        Ok(MergeOutcome {
            merged: committed_rows,
            batches,
        })
    }

    async fn list_device_usage(
        &self,
        device_id: Uuid,
        listing: &DeviceUsageListing,
    ) -> Result<Page<UsageEntry>, StoreError> {
        let operation = "list_device_app_usage";
        let timer = QueryTimer::new(operation);
        let rows = device_usage_query(device_id, listing)
            .build_query_as::<DeviceAppUsageEntity>()
            .fetch_all(&self.reader)
            .await;
        timer.record();

        let rows = rows.map_err(|source| StoreError::Query { operation, source })?;

        listing
            .page
            .paginate(rows)
            .try_map(UsageEntry::try_from)
            .map_err(|detail| StoreError::OutOfRange { operation, detail })
    }

    async fn aggregate_usage(
        &self,
        listing: &UsageAggregateListing,
    ) -> Result<Page<UsageAggregate>, StoreError> {
        let operation = "aggregate_app_usage";
        let timer = QueryTimer::new(operation);
        let rows = aggregate_query(listing)
            .build_query_as::<UsageAggregateRow>()
            .fetch_all(&self.reader)
            .await;
        timer.record();

        let rows = rows.map_err(|source| StoreError::Query { operation, source })?;

        listing
            .page
            .paginate(rows)
            .try_map(UsageAggregate::try_from)
            .map_err(|detail| StoreError::OutOfRange { operation, detail })
    }
}
