//! SQLite storage for scan history
//!
//! Timestamps are stored as fixed-width RFC 3339 text (nanosecond precision,
//! `Z` suffix) so that lexical order equals chronological order.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::{HistoryError, HistoryRecord, Result};

impl From<sqlx::Error> for HistoryError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for HistoryError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Migration(e.to_string())
    }
}

/// SQLite-backed history storage
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

/// Row type for database queries.
#[derive(FromRow)]
struct ScanRecordRow {
    id: String,
    created_at: String,
    recognized_name: String,
    recognized_id: Option<String>,
    confidence: Option<f64>,
    thumbnail_jpeg: Option<Vec<u8>>,
    remote_image_url: Option<String>,
}

impl TryFrom<ScanRecordRow> for HistoryRecord {
    type Error = HistoryError;

    fn try_from(row: ScanRecordRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| HistoryError::Serialization(format!("record id {:?}: {e}", row.id)))?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| {
                HistoryError::Serialization(format!("created_at {:?}: {e}", row.created_at))
            })?
            .with_timezone(&Utc);

        Ok(Self {
            id,
            created_at,
            recognized_name: row.recognized_name,
            recognized_id: row.recognized_id,
            confidence: row.confidence,
            thumbnail_jpeg: row.thumbnail_jpeg,
            remote_image_url: row.remote_image_url,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, created_at, recognized_name, recognized_id, confidence, \
     thumbnail_jpeg, remote_image_url FROM scan_records";

impl SqliteHistoryStore {
    /// Connect to `database_url`, creating the file if it does not exist.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| HistoryError::Connection(e.to_string()))?
            .create_if_missing(true);

        // Every connection to `:memory:` is its own database: pin to one.
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Connection(e.to_string()))?;

        tracing::info!(in_memory, "Connected to SQLite history database");
        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("History migrations completed");
        Ok(())
    }

    /// Check database connection health
    pub async fn check_health(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| HistoryError::Connection(e.to_string()))?;
        Ok(())
    }

    pub async fn append(&self, record: &HistoryRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO scan_records
                (id, created_at, recognized_name, recognized_id, confidence,
                 thumbnail_jpeg, remote_image_url)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(encode_timestamp(&record.created_at))
        .bind(&record.recognized_name)
        .bind(&record.recognized_id)
        .bind(record.confidence)
        .bind(&record.thumbnail_jpeg)
        .bind(&record.remote_image_url)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::debug!(record_id = %record.id, "History record stored");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(HistoryError::DuplicateRecord(record.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(&self) -> Result<Vec<HistoryRecord>> {
        let rows: Vec<ScanRecordRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, seq DESC"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(HistoryRecord::try_from).collect()
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<HistoryRecord>> {
        let row: Option<ScanRecordRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(HistoryRecord::try_from).transpose()
    }

    /// Delete every listed id inside one transaction.
    pub async fn delete(&self, ids: &[Uuid]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for id in ids {
            removed += sqlx::query("DELETE FROM scan_records WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        tracing::debug!(requested = ids.len(), removed, "History records deleted");
        Ok(removed as usize)
    }

    pub async fn clear(&self) -> Result<usize> {
        let removed = sqlx::query("DELETE FROM scan_records")
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(removed, "History cleared");
        Ok(removed as usize)
    }

    pub async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

fn encode_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    async fn memory_store() -> SqliteHistoryStore {
        let store = SqliteHistoryStore::new("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_thumbnail_round_trip_is_byte_identical() {
        let store = memory_store().await;
        let thumbnail: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let record = HistoryRecord {
            recognized_id: Some("3001".into()),
            confidence: Some(0.5),
            thumbnail_jpeg: Some(thumbnail.clone()),
            remote_image_url: Some("https://img.example/3001.png".into()),
            ..HistoryRecord::new("Brick 2 x 4")
        };

        store.append(&record).await.unwrap();
        let loaded = store.get(record.id).await.unwrap().unwrap();

        assert_eq!(loaded.thumbnail_jpeg.as_deref(), Some(thumbnail.as_slice()));
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_optional_fields_round_trip_as_none() {
        let store = memory_store().await;
        let record = HistoryRecord::new("Unknown piece");

        store.append(&record).await.unwrap();
        let loaded = store.get(record.id).await.unwrap().unwrap();

        assert_eq!(loaded, record);
        assert!(loaded.thumbnail_jpeg.is_none());
        assert!(loaded.remote_image_url.is_none());
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_with_insertion_tiebreak() {
        let store = memory_store().await;
        let stamp = Utc::now();
        let older = HistoryRecord {
            created_at: stamp - Duration::hours(1),
            ..HistoryRecord::new("older")
        };
        let tie_a = HistoryRecord {
            created_at: stamp,
            ..HistoryRecord::new("tie-a")
        };
        let tie_b = HistoryRecord {
            created_at: stamp,
            ..HistoryRecord::new("tie-b")
        };

        store.append(&tie_a).await.unwrap();
        store.append(&older).await.unwrap();
        store.append(&tie_b).await.unwrap();

        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.recognized_name)
            .collect();
        assert_eq!(names, ["tie-b", "tie-a", "older"]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = memory_store().await;
        let record = HistoryRecord::new("Brick");
        store.append(&record).await.unwrap();

        assert_eq!(store.delete(&[record.id]).await.unwrap(), 1);
        assert_eq!(store.delete(&[record.id]).await.unwrap(), 0);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_append_is_rejected() {
        let store = memory_store().await;
        let record = HistoryRecord::new("Brick");
        store.append(&record).await.unwrap();

        let err = store.append(&record).await.unwrap_err();
        assert!(matches!(err, HistoryError::DuplicateRecord(_)));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_and_health() {
        let store = memory_store().await;
        store.check_health().await.unwrap();
        for name in ["a", "b", "c"] {
            store.append(&HistoryRecord::new(name)).await.unwrap();
        }

        assert_eq!(store.clear().await.unwrap(), 3);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[test]
    fn test_timestamp_encoding_is_fixed_width() {
        let whole = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let fractional = whole + Duration::nanoseconds(1);

        let a = encode_timestamp(&whole);
        let b = encode_timestamp(&fractional);
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(a, "2026-01-02T03:04:05.000000000Z");
    }
}
