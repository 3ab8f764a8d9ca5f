use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Router,
};
use domain::services::AppUsageService;
use persistence::db::DatabasePools;
use persistence::repositories::AppUsageRepository;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, require_auth, trace_id};
use crate::routes::{app_usage, health};

#[derive(Clone)]
pub struct AppState {
    /// Primary (writer) pool. Also used for API key lookups.
    pub pool: PgPool,
    /// Reader pool; the primary when no replica is configured.
    pub reader: PgPool,
    pub config: Arc<Config>,
    pub app_usage: Arc<AppUsageService<AppUsageRepository>>,
    /// Cancelled when the server begins shutting down.
    pub shutdown: CancellationToken,
}

pub fn create_app(config: Config, pools: DatabasePools) -> Router {
    create_app_with_shutdown(config, pools, CancellationToken::new())
}

pub fn create_app_with_shutdown(
    config: Config,
    pools: DatabasePools,
    shutdown: CancellationToken,
) -> Router {
    let config = Arc::new(config);

    let repository = AppUsageRepository::with_pools(pools.clone())
        .with_batch_size(config.ingestion.batch_size);
    let app_usage = AppUsageService::new(repository, config.pagination.limits())
        .with_cancellation(shutdown.clone());

    let state = AppState {
        pool: pools.writer,
        reader: pools.reader,
        config: config.clone(),
        app_usage: Arc::new(app_usage),
        shutdown,
    };

    let cors = if config.server.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .server
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Protected routes (require API key authentication)
    let protected_routes = Router::new()
        .route(
            "/api/v1/devices/:device_id/app-usage",
            get(app_usage::list_device_app_usage).post(app_usage::merge_device_app_usage),
        )
        .route("/api/v1/app-usage", get(app_usage::aggregate_app_usage))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
