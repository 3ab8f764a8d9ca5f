//! API key authentication extractor.
//!
//! Provides an Axum extractor for validating API keys from requests.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::models::Principal;
use sqlx::PgPool;

use crate::app::AppState;
use crate::error::ApiError;
use persistence::repositories::ApiKeyRepository;
use shared::crypto::{extract_key_prefix, sha256_hex};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Authenticated API key information.
///
/// This extractor validates the `X-API-Key` header against the database
/// and provides the principal the key authenticates as.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    /// Key prefix for identification (first 8 characters after "au_").
    pub key_prefix: String,
    pub principal: Principal,
}

impl ApiKeyAuth {
    /// Validates an API key and returns authentication info.
    pub async fn validate(pool: &PgPool, api_key: &str) -> Result<Self, ApiError> {
        let presented_prefix = extract_key_prefix(api_key).ok_or_else(|| {
            ApiError::Unauthorized("Invalid or missing API key".to_string())
        })?;

        let key_hash = sha256_hex(api_key);

        let repo = ApiKeyRepository::new(pool.clone());
        let key = repo
            .find_by_key_hash(&key_hash)
            .await
            .map_err(|e| {
                tracing::error!("Database error during API key lookup: {}", e);
                ApiError::ServiceUnavailable("Authentication service unavailable".to_string())
            })?
            .ok_or_else(|| {
                tracing::debug!(key_prefix = presented_prefix, "Unknown API key");
                ApiError::Unauthorized("Invalid or missing API key".to_string())
            })?;

        if !ApiKeyRepository::is_key_valid(&key) {
            return Err(if key.is_active {
                ApiError::Unauthorized("API key has expired".to_string())
            } else {
                ApiError::Unauthorized("Invalid or missing API key".to_string())
            });
        }

        let principal = key.principal().map_err(|e| {
            tracing::error!(api_key_id = key.id, "Stored API key is unusable: {}", e);
            ApiError::Internal(e)
        })?;

        // Update last_used_at asynchronously (fire and forget)
        let pool_clone = pool.clone();
        let key_id = key.id;
        tokio::spawn(async move {
            let repo = ApiKeyRepository::new(pool_clone);
            if let Err(e) = repo.update_last_used(key_id).await {
                tracing::warn!("Failed to update API key last_used_at: {}", e);
            }
        });

        Ok(ApiKeyAuth {
            key_prefix: key.key_prefix,
            principal,
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ApiKeyAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Already authenticated by the route middleware
        if let Some(auth) = parts.extensions.get::<ApiKeyAuth>() {
            return Ok(auth.clone());
        }

        let api_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Invalid or missing API key".to_string()))?;

        Self::validate(&state.pool, api_key).await
    }
}
