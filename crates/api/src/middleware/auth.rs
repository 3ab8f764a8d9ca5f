//! Authentication middleware.
//!
//! Provides middleware for requiring API key authentication on routes.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app::AppState;
use crate::extractors::api_key::{ApiKeyAuth, API_KEY_HEADER};

/// Middleware that requires API key authentication.
///
/// This middleware validates the `X-API-Key` header and rejects requests
/// without a valid API key. Authenticated key information is stored in
/// request extensions for use by downstream handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let api_key = match req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        Some(key) => key.to_string(),
        None => return unauthorized_response("Invalid or missing API key"),
    };

    match ApiKeyAuth::validate(&state.pool, &api_key).await {
        Ok(auth) => {
            tracing::Span::current().record("api_key_id", auth.principal.api_key_id);
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

/// Helper to create unauthorized response.
fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_response() {
        let response = unauthorized_response("Invalid or missing API key");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unauthorized_response_empty_message() {
        let response = unauthorized_response("");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
