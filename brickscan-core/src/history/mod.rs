//! Scan history storage
//!
//! Every completed recognition becomes one immutable [`HistoryRecord`].
//! Two backends:
//! - **SQLite** (sqlx): persisted on disk, survives restarts.
//! - **Memory**: process-local, for tests and throwaway sessions.
//!
//! Ordering contract for [`HistoryStore::list`]: newest `created_at` first,
//! ties broken by insertion order (most recently inserted first).

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryHistory;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteHistoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::RecognitionResult;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("History record {0} already exists")]
    DuplicateRecord(Uuid),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// One completed recognition, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub recognized_name: String,
    pub recognized_id: Option<String>,
    pub confidence: Option<f64>,
    /// Small JPEG of the captured image
    pub thumbnail_jpeg: Option<Vec<u8>>,
    /// Reference image URL reported by the service, kept as text
    pub remote_image_url: Option<String>,
}

impl HistoryRecord {
    /// Bare record named `recognized_name`, stamped now.
    pub fn new(recognized_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            recognized_name: recognized_name.into(),
            recognized_id: None,
            confidence: None,
            thumbnail_jpeg: None,
            remote_image_url: None,
        }
    }

    /// Record for a successful recognition, stamped now.
    pub fn from_result(result: &RecognitionResult, thumbnail_jpeg: Option<Vec<u8>>) -> Self {
        Self {
            recognized_id: result.identifier.clone(),
            confidence: result.confidence,
            thumbnail_jpeg,
            remote_image_url: result.image_reference.as_ref().map(|url| url.to_string()),
            ..Self::new(result.name.clone())
        }
    }
}

/// History storage backend
enum HistoryBackend {
    /// SQLite storage (persistent)
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteHistoryStore),
    /// In-memory storage
    Memory(MemoryHistory),
}

/// The single owner of the persisted scan history.
///
/// Mutations are atomic with respect to concurrent [`list`](Self::list)
/// calls: readers never observe a partially written record or a partially
/// applied bulk delete.
pub struct HistoryStore {
    backend: HistoryBackend,
}

impl HistoryStore {
    /// Open (creating if needed) a SQLite history at `database_url`.
    #[cfg(feature = "sqlite")]
    pub async fn open(database_url: &str) -> Result<Self> {
        let store = SqliteHistoryStore::new(database_url).await?;
        store.migrate().await?;

        Ok(Self {
            backend: HistoryBackend::Sqlite(store),
        })
    }

    /// Create a process-local history.
    pub fn in_memory() -> Self {
        Self {
            backend: HistoryBackend::Memory(MemoryHistory::new()),
        }
    }

    /// Create storage from environment
    ///
    /// Uses SQLite if `BRICKSCAN_DATABASE_URL` is set, otherwise falls back to
    /// in-memory storage.
    pub async fn from_env() -> Result<Self> {
        match std::env::var("BRICKSCAN_DATABASE_URL") {
            #[cfg(feature = "sqlite")]
            Ok(url) if !url.is_empty() => {
                tracing::info!("Using SQLite history storage");
                Self::open(&url).await
            }
            _ => {
                tracing::warn!(
                    "BRICKSCAN_DATABASE_URL not set, using in-memory history (lost on exit)"
                );
                Ok(Self::in_memory())
            }
        }
    }

    pub fn is_persistent(&self) -> bool {
        match &self.backend {
            #[cfg(feature = "sqlite")]
            HistoryBackend::Sqlite(_) => true,
            HistoryBackend::Memory(_) => false,
        }
    }

    /// Check database health (always Ok for memory backend)
    pub async fn check_health(&self) -> Result<()> {
        match &self.backend {
            #[cfg(feature = "sqlite")]
            HistoryBackend::Sqlite(db) => db.check_health().await,
            HistoryBackend::Memory(_) => Ok(()),
        }
    }

    /// Insert one new record.
    ///
    /// Fails with [`HistoryError::DuplicateRecord`] if the id is taken;
    /// records are never overwritten.
    pub async fn append(&self, record: &HistoryRecord) -> Result<()> {
        match &self.backend {
            #[cfg(feature = "sqlite")]
            HistoryBackend::Sqlite(db) => db.append(record).await,
            HistoryBackend::Memory(mem) => mem.append(record.clone()).await,
        }
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<HistoryRecord>> {
        match &self.backend {
            #[cfg(feature = "sqlite")]
            HistoryBackend::Sqlite(db) => db.list().await,
            HistoryBackend::Memory(mem) => Ok(mem.list().await),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<HistoryRecord>> {
        match &self.backend {
            #[cfg(feature = "sqlite")]
            HistoryBackend::Sqlite(db) => db.get(id).await,
            HistoryBackend::Memory(mem) => Ok(mem.get(id).await),
        }
    }

    /// Remove the records with these ids; returns how many existed.
    ///
    /// Absent ids are ignored, so repeating a delete is a no-op.
    pub async fn delete(&self, ids: &[Uuid]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        match &self.backend {
            #[cfg(feature = "sqlite")]
            HistoryBackend::Sqlite(db) => db.delete(ids).await,
            HistoryBackend::Memory(mem) => Ok(mem.delete(ids).await),
        }
    }

    /// Remove every record; returns how many existed.
    pub async fn clear(&self) -> Result<usize> {
        match &self.backend {
            #[cfg(feature = "sqlite")]
            HistoryBackend::Sqlite(db) => db.clear().await,
            HistoryBackend::Memory(mem) => Ok(mem.clear().await),
        }
    }

    pub async fn count(&self) -> Result<usize> {
        match &self.backend {
            #[cfg(feature = "sqlite")]
            HistoryBackend::Sqlite(db) => db.count().await,
            HistoryBackend::Memory(mem) => Ok(mem.len().await),
        }
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            #[cfg(feature = "sqlite")]
            HistoryBackend::Sqlite(_) => "SQLite",
            HistoryBackend::Memory(_) => "Memory",
        };
        f.debug_struct("HistoryStore")
            .field("backend", &backend)
            .finish()
    }
}
