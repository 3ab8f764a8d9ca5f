//! Prints the app usage ingestion body for this machine.
//!
//! Usage: `usage-collector [KNOWLEDGE_DB_PATH]`

use anyhow::Result;
use collector::{ingestion_body, KnowledgeStoreCollector, DEFAULT_KNOWLEDGE_DB_PATH};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays a clean JSON document
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_KNOWLEDGE_DB_PATH.to_string());

    let samples = KnowledgeStoreCollector::new(path).collect().await?;
    println!("{}", serde_json::to_string_pretty(&ingestion_body(samples))?);

    Ok(())
}
