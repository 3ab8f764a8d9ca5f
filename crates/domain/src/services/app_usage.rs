//! App usage service.
//!
//! Wraps an [`AppUsageStore`] with the rules every caller must go through:
//! the capability check runs first, list options are resolved against the
//! configured page limits, and store work aborts when the service's
//! cancellation token fires.

use std::future::Future;

use shared::pagination::{Page, PageLimits, PaginationError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::access::{AccessDenied, Capability};
use crate::models::app_usage::{
    DeviceUsageListing, DeviceUsageQuery, MergeOutcome, NewUsageEntry, UsageAggregate,
    UsageAggregateListing, UsageAggregateQuery, UsageEntry,
};
use crate::services::access::Authorizer;

/// Errors raised by an app usage store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A merge batch failed. Batches before it remain committed.
    #[error("Merge batch {batch} of {batches} failed after {committed_rows} rows were committed: {source}")]
    MergeBatch {
        /// One-based index of the failing batch.
        batch: usize,
        batches: usize,
        committed_rows: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("{operation} failed: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A stored value does not fit the domain type.
    #[error("{operation} returned an out of range value: {detail}")]
    OutOfRange {
        operation: &'static str,
        detail: String,
    },
}

/// Persistence operations behind the app usage service.
#[async_trait::async_trait]
pub trait AppUsageStore: Send + Sync {
    /// Upserts rows for one device in fixed-size batches. Existing rows with
    /// the same `(device_id, bundle_identifier, usage_date)` are overwritten.
    async fn merge_usage(
        &self,
        device_id: Uuid,
        entries: &[NewUsageEntry],
    ) -> Result<MergeOutcome, StoreError>;

    /// Lists one device's rows.
    async fn list_device_usage(
        &self,
        device_id: Uuid,
        listing: &DeviceUsageListing,
    ) -> Result<Page<UsageEntry>, StoreError>;

    /// Sums usage per application across devices.
    async fn aggregate_usage(
        &self,
        listing: &UsageAggregateListing,
    ) -> Result<Page<UsageAggregate>, StoreError>;
}

/// Errors surfaced by [`AppUsageService`].
#[derive(Debug, Error)]
pub enum AppUsageError {
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    #[error(transparent)]
    InvalidQuery(#[from] PaginationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Entry point for app usage ingestion and queries.
pub struct AppUsageService<S> {
    store: S,
    limits: PageLimits,
    cancel: CancellationToken,
}

impl<S: AppUsageStore> AppUsageService<S> {
    pub fn new(store: S, limits: PageLimits) -> Self {
        Self {
            store,
            limits,
            cancel: CancellationToken::new(),
        }
    }

    /// Aborts in-flight and future store calls when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    async fn run<T>(
        &self,
        operation: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AppUsageError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppUsageError::Cancelled),
            result = operation => Ok(result?),
        }
    }

    /// Merges usage rows reported for `device_id`.
    ///
    /// An empty input is a no-op. On a batch failure the error carries how
    /// many rows earlier batches already committed.
    pub async fn merge_usage(
        &self,
        caller: &dyn Authorizer,
        device_id: Uuid,
        entries: &[NewUsageEntry],
    ) -> Result<MergeOutcome, AppUsageError> {
        caller.authorize(&Capability::WriteUsage { device_id })?;

        if entries.is_empty() {
            debug!(device_id = %device_id, "No app usage entries to merge");
            return Ok(MergeOutcome::default());
        }

        let outcome = self.run(self.store.merge_usage(device_id, entries)).await?;

        info!(
            device_id = %device_id,
            merged = outcome.merged,
            batches = outcome.batches,
            "Merged app usage"
        );

        Ok(outcome)
    }

    /// Lists one device's usage rows.
    pub async fn device_usage(
        &self,
        caller: &dyn Authorizer,
        device_id: Uuid,
        query: &DeviceUsageQuery,
    ) -> Result<Page<UsageEntry>, AppUsageError> {
        caller.authorize(&Capability::ReadHosts)?;

        let listing = query.resolve(&self.limits)?;
        self.run(self.store.list_device_usage(device_id, &listing))
            .await
    }

    /// Aggregates usage per application, optionally within one team.
    pub async fn aggregate_usage(
        &self,
        caller: &dyn Authorizer,
        query: &UsageAggregateQuery,
    ) -> Result<Page<UsageAggregate>, AppUsageError> {
        caller.authorize(&Capability::ReadSoftwareInventory {
            team_id: query.team_id,
        })?;

        let listing = query.resolve(&self.limits)?;
        self.run(self.store.aggregate_usage(&listing)).await
    }
}
