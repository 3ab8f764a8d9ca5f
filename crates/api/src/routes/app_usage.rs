//! App usage route handlers.
//!
//! - POST /api/v1/devices/:device_id/app-usage - merge a device's usage rows
//! - GET  /api/v1/devices/:device_id/app-usage - list a device's usage rows
//! - GET  /api/v1/app-usage                    - usage aggregated per application

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ApiKeyAuth;
use domain::models::{DeviceUsageQuery, MergeUsageRequest, UsageAggregateQuery};

/// Merge usage rows reported for a device.
///
/// POST /api/v1/devices/:device_id/app-usage
#[axum::debug_handler]
pub async fn merge_device_app_usage(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
    auth: ApiKeyAuth,
    Json(request): Json<MergeUsageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let max_entries = state.config.ingestion.max_entries_per_request;
    if request.entries.len() > max_entries {
        return Err(ApiError::validation(format!(
            "At most {} entries may be merged per request",
            max_entries
        )));
    }

    request.validate()?;

    if let Some((bundle_identifier, usage_date)) = request.duplicate_key() {
        return Err(ApiError::validation(format!(
            "Duplicate entry for {} on {}",
            bundle_identifier, usage_date
        )));
    }

    let outcome = state
        .app_usage
        .merge_usage(&auth.principal, device_id, &request.entries)
        .await?;

    info!(
        device_id = %device_id,
        api_key_id = auth.principal.api_key_id,
        merged = outcome.merged,
        "Merged device app usage"
    );

    Ok((StatusCode::OK, Json(outcome)))
}

/// List a device's usage rows.
///
/// GET /api/v1/devices/:device_id/app-usage
#[axum::debug_handler]
pub async fn list_device_app_usage(
    State(state): State<AppState>,
    Path(device_id): Path<Uuid>,
    Query(query): Query<DeviceUsageQuery>,
    auth: ApiKeyAuth,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .app_usage
        .device_usage(&auth.principal, device_id, &query)
        .await?;

    debug!(
        device_id = %device_id,
        count = page.items.len(),
        has_next = page.meta.has_next,
        "Retrieved device app usage"
    );

    Ok((StatusCode::OK, Json(page)))
}

/// Usage summed per application across devices, optionally for one team.
///
/// GET /api/v1/app-usage
#[axum::debug_handler]
pub async fn aggregate_app_usage(
    State(state): State<AppState>,
    Query(query): Query<UsageAggregateQuery>,
    auth: ApiKeyAuth,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .app_usage
        .aggregate_usage(&auth.principal, &query)
        .await?;

    debug!(
        team_id = ?query.team_id,
        count = page.items.len(),
        has_next = page.meta.has_next,
        "Retrieved aggregated app usage"
    );

    Ok((StatusCode::OK, Json(page)))
}
