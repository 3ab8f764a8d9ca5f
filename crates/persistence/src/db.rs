//! Database connection pool management.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Read replica URL. Reads go to the primary when absent.
    pub read_url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Writer and reader pools. Both point at the same pool when no replica is
/// configured.
#[derive(Debug, Clone)]
pub struct DatabasePools {
    pub writer: PgPool,
    pub reader: PgPool,
}

impl DatabasePools {
    /// Uses one pool for both reads and writes.
    pub fn single(pool: PgPool) -> Self {
        Self {
            writer: pool.clone(),
            reader: pool,
        }
    }
}

/// Creates a PostgreSQL connection pool with the given configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    connect(config, &config.url).await
}

/// Creates the writer pool and, when configured, a separate reader pool.
pub async fn create_pools(config: &DatabaseConfig) -> Result<DatabasePools, sqlx::Error> {
    let writer = create_pool(config).await?;

    match config.read_url.as_deref().filter(|url| !url.is_empty()) {
        Some(read_url) => {
            let reader = connect(config, read_url).await?;
            info!("Using read replica for app usage queries");
            Ok(DatabasePools { writer, reader })
        }
        None => Ok(DatabasePools::single(writer)),
    }
}

async fn connect(config: &DatabaseConfig, url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(url)
        .await
}
