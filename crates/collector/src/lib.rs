//! Device-side app usage collection.
//!
//! Reads per-day foreground time from the macOS knowledge store and turns
//! it into entries for the ingestion endpoint.

pub mod knowledge;

pub use knowledge::{
    ingestion_body, CollectorError, KnowledgeStoreCollector, UsageSample, DEFAULT_KNOWLEDGE_DB_PATH,
};
