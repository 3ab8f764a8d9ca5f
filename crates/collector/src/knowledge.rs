//! Knowledge store reader.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use domain::models::NewUsageEntry;
use serde_json::json;
use shared::validation::validate_bundle_identifier;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, FromRow};
use thiserror::Error;
use tracing::{debug, info};

/// System-wide knowledge store holding Screen Time data for all users.
pub const DEFAULT_KNOWLEDGE_DB_PATH: &str = "/private/var/db/CoreDuet/Knowledge/knowledgeC.db";

/// Foreground usage per bundle and local calendar day. Timestamps in the
/// store are Mac absolute time (seconds since 2001-01-01 UTC).
const USAGE_QUERY: &str = r#"
    SELECT
        ZOBJECT.ZVALUESTRING AS bundle_identifier,
        date(ZOBJECT.ZSTARTDATE + 978307200, 'unixepoch', 'localtime') AS usage_date,
        CAST(SUM(ZOBJECT.ZENDDATE - ZOBJECT.ZSTARTDATE) AS INTEGER) AS active_seconds
    FROM ZOBJECT
    WHERE ZSTREAMNAME = '/app/usage'
      AND ZOBJECT.ZENDDATE IS NOT NULL
      AND ZOBJECT.ZSTARTDATE IS NOT NULL
      AND ZOBJECT.ZVALUESTRING IS NOT NULL
      AND (ZOBJECT.ZENDDATE - ZOBJECT.ZSTARTDATE) > 0
    GROUP BY ZOBJECT.ZVALUESTRING,
             date(ZOBJECT.ZSTARTDATE + 978307200, 'unixepoch', 'localtime')
    ORDER BY SUM(ZOBJECT.ZENDDATE - ZOBJECT.ZSTARTDATE) DESC
"#;

/// Collector errors. A missing store or a failing query is not an error.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Failed to access knowledge store at {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Foreground time for one application on one local day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSample {
    pub bundle_identifier: String,
    pub usage_date: NaiveDate,
    pub active_seconds: u64,
}

impl From<UsageSample> for NewUsageEntry {
    fn from(sample: UsageSample) -> Self {
        NewUsageEntry {
            bundle_identifier: sample.bundle_identifier,
            app_name: String::new(),
            usage_date: sample.usage_date,
            active_seconds: sample.active_seconds,
        }
    }
}

#[derive(Debug, FromRow)]
struct RawUsageRow {
    bundle_identifier: Option<String>,
    usage_date: Option<String>,
    active_seconds: Option<i64>,
}

impl RawUsageRow {
    /// Returns `None` for rows the ingestion endpoint would reject (bundle
    /// identifier blank, too long or containing whitespace), with an
    /// unparsable date, or with missing or negative seconds.
    fn into_sample(self) -> Option<UsageSample> {
        let bundle_identifier = self
            .bundle_identifier
            .filter(|b| validate_bundle_identifier(b).is_ok())?;
        let usage_date = NaiveDate::parse_from_str(self.usage_date?.as_str(), "%Y-%m-%d").ok()?;
        let active_seconds = u64::try_from(self.active_seconds?).ok()?;

        Some(UsageSample {
            bundle_identifier,
            usage_date,
            active_seconds,
        })
    }
}

/// Reads app usage from a knowledge store database.
#[derive(Debug, Clone)]
pub struct KnowledgeStoreCollector {
    path: PathBuf,
}

impl Default for KnowledgeStoreCollector {
    fn default() -> Self {
        Self::new(DEFAULT_KNOWLEDGE_DB_PATH)
    }
}

impl KnowledgeStoreCollector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Collects per-day usage, largest totals first.
    ///
    /// Returns an empty list when the store does not exist or cannot be
    /// queried. Fails only when the store's metadata cannot be read for
    /// another reason, such as missing permissions.
    pub async fn collect(&self) -> Result<Vec<UsageSample>, CollectorError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Knowledge store not found, no app usage collected");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(CollectorError::Access {
                    path: self.path.clone(),
                    source,
                })
            }
        }

        match self.query().await {
            Ok(samples) => {
                info!(
                    path = %self.path.display(),
                    samples = samples.len(),
                    "Collected app usage"
                );
                Ok(samples)
            }
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Failed to query knowledge store");
                Ok(Vec::new())
            }
        }
    }

    async fn query(&self) -> Result<Vec<UsageSample>, sqlx::Error> {
        let mut conn = SqliteConnectOptions::new()
            .filename(&self.path)
            .read_only(true)
            .connect()
            .await?;

        let rows = sqlx::query_as::<_, RawUsageRow>(USAGE_QUERY)
            .fetch_all(&mut conn)
            .await;
        conn.close().await.ok();

        let rows = rows?;
        let total = rows.len();
        let samples: Vec<UsageSample> = rows.into_iter().filter_map(RawUsageRow::into_sample).collect();

        if samples.len() < total {
            debug!(dropped = total - samples.len(), "Dropped malformed knowledge store rows");
        }

        Ok(samples)
    }
}

/// Builds the ingestion request body for a set of samples.
pub fn ingestion_body(samples: Vec<UsageSample>) -> serde_json::Value {
    let entries: Vec<NewUsageEntry> = samples.into_iter().map(NewUsageEntry::from).collect();
    json!({ "entries": entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Executor;

    /// Mac absolute time of 2026-02-10 12:00:00 UTC.
    const FEB_10_NOON: f64 = 1_770_724_800.0 - 978_307_200.0;
    const DAY: f64 = 86_400.0;

    fn temp_db_path(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}_{}.db", prefix, uuid::Uuid::new_v4()))
    }

    async fn create_store(path: &Path, rows: &[(&str, Option<&str>, f64, f64)]) {
        let mut conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();

        conn.execute(
            "CREATE TABLE ZOBJECT (Z_PK INTEGER PRIMARY KEY, ZSTREAMNAME TEXT, ZVALUESTRING TEXT, ZSTARTDATE REAL, ZENDDATE REAL)",
        )
        .await
        .unwrap();

        for (stream, bundle, start, end) in rows {
            sqlx::query("INSERT INTO ZOBJECT (ZSTREAMNAME, ZVALUESTRING, ZSTARTDATE, ZENDDATE) VALUES (?, ?, ?, ?)")
                .bind(*stream)
                .bind(*bundle)
                .bind(*start)
                .bind(*end)
                .execute(&mut conn)
                .await
                .unwrap();
        }

        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_collect_missing_store_is_empty() {
        let collector = KnowledgeStoreCollector::new(temp_db_path("missing"));
        let samples = collector.collect().await.unwrap();
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn test_collect_sums_per_bundle_and_day() {
        let path = temp_db_path("knowledge");
        create_store(
            &path,
            &[
                ("/app/usage", Some("com.apple.Safari"), FEB_10_NOON, FEB_10_NOON + 1800.0),
                ("/app/usage", Some("com.apple.Safari"), FEB_10_NOON + 3600.0, FEB_10_NOON + 5400.0),
                ("/app/usage", Some("com.apple.mail"), FEB_10_NOON, FEB_10_NOON + 600.0),
                ("/app/usage", Some("com.apple.Safari"), FEB_10_NOON + DAY, FEB_10_NOON + DAY + 7200.0),
                // Other streams and empty intervals are ignored
                ("/app/inFocus", Some("com.apple.Safari"), FEB_10_NOON, FEB_10_NOON + 9999.0),
                ("/app/usage", Some("com.apple.Notes"), FEB_10_NOON, FEB_10_NOON),
                ("/app/usage", None, FEB_10_NOON, FEB_10_NOON + 100.0),
            ],
        )
        .await;

        let samples = KnowledgeStoreCollector::new(&path).collect().await.unwrap();
        std::fs::remove_file(&path).ok();

        let feb_10 = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        let feb_11 = NaiveDate::from_ymd_opt(2026, 2, 11).unwrap();
        assert_eq!(
            samples,
            vec![
                UsageSample {
                    bundle_identifier: "com.apple.Safari".to_string(),
                    usage_date: feb_11,
                    active_seconds: 7200,
                },
                UsageSample {
                    bundle_identifier: "com.apple.Safari".to_string(),
                    usage_date: feb_10,
                    active_seconds: 3600,
                },
                UsageSample {
                    bundle_identifier: "com.apple.mail".to_string(),
                    usage_date: feb_10,
                    active_seconds: 600,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_unqueryable_store_is_empty() {
        let path = temp_db_path("not_a_store");
        std::fs::write(&path, b"definitely not sqlite").unwrap();

        let samples = KnowledgeStoreCollector::new(&path).collect().await.unwrap();
        std::fs::remove_file(&path).ok();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_malformed_rows_dropped() {
        let good = RawUsageRow {
            bundle_identifier: Some("com.apple.Safari".to_string()),
            usage_date: Some("2026-02-11".to_string()),
            active_seconds: Some(3600),
        };
        assert_eq!(
            good.into_sample().unwrap().usage_date,
            NaiveDate::from_ymd_opt(2026, 2, 11).unwrap()
        );

        let bad_rows = [
            RawUsageRow {
                bundle_identifier: Some("  ".to_string()),
                usage_date: Some("2026-02-11".to_string()),
                active_seconds: Some(1),
            },
            RawUsageRow {
                bundle_identifier: Some("com.apple Safari".to_string()),
                usage_date: Some("2026-02-11".to_string()),
                active_seconds: Some(1),
            },
            RawUsageRow {
                bundle_identifier: Some("com.apple.Safari\u{7}".to_string()),
                usage_date: Some("2026-02-11".to_string()),
                active_seconds: Some(1),
            },
            RawUsageRow {
                bundle_identifier: Some(format!("com.{}", "a".repeat(300))),
                usage_date: Some("2026-02-11".to_string()),
                active_seconds: Some(1),
            },
            RawUsageRow {
                bundle_identifier: Some("com.apple.Safari".to_string()),
                usage_date: Some("11/02/2026".to_string()),
                active_seconds: Some(1),
            },
            RawUsageRow {
                bundle_identifier: Some("com.apple.Safari".to_string()),
                usage_date: Some("2026-02-11".to_string()),
                active_seconds: Some(-5),
            },
            RawUsageRow {
                bundle_identifier: Some("com.apple.Safari".to_string()),
                usage_date: None,
                active_seconds: Some(1),
            },
            RawUsageRow {
                bundle_identifier: Some("com.apple.Safari".to_string()),
                usage_date: Some("2026-02-11".to_string()),
                active_seconds: None,
            },
        ];
        for row in bad_rows {
            assert!(row.into_sample().is_none());
        }
    }

    #[test]
    fn test_ingestion_body_shape() {
        let body = ingestion_body(vec![UsageSample {
            bundle_identifier: "com.apple.Safari".to_string(),
            usage_date: NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(),
            active_seconds: 3600,
        }]);

        assert_eq!(body["entries"][0]["bundle_identifier"], "com.apple.Safari");
        assert_eq!(body["entries"][0]["usage_date"], "2026-02-11");
        assert_eq!(body["entries"][0]["active_seconds"], 3600);
        assert_eq!(body["entries"][0]["app_name"], "");
    }

    #[tokio::test]
    async fn test_collected_body_passes_ingestion_validation() {
        use domain::models::MergeUsageRequest;
        use validator::Validate;

        let long_bundle = format!("com.{}", "a".repeat(300));
        let path = temp_db_path("unusual_bundles");
        create_store(
            &path,
            &[
                ("/app/usage", Some("com.apple.Safari"), FEB_10_NOON, FEB_10_NOON + 60.0),
                ("/app/usage", Some("com.apple Safari"), FEB_10_NOON, FEB_10_NOON + 60.0),
                ("/app/usage", Some("com.apple.mail\t"), FEB_10_NOON, FEB_10_NOON + 60.0),
                ("/app/usage", Some(long_bundle.as_str()), FEB_10_NOON, FEB_10_NOON + 60.0),
            ],
        )
        .await;

        let samples = KnowledgeStoreCollector::new(&path).collect().await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].bundle_identifier, "com.apple.Safari");

        let request: MergeUsageRequest =
            serde_json::from_value(ingestion_body(samples)).unwrap();
        assert!(request.validate().is_ok());
    }
}
