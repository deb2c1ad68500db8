//! In-memory history backend
//!
//! A single `RwLock` guards the whole collection, so a bulk delete is applied
//! all at once from the point of view of readers. The vector is kept in list
//! order at all times.

use tokio::sync::RwLock;
use uuid::Uuid;

use super::{HistoryError, HistoryRecord, Result};

/// Process-local scan history
#[derive(Default)]
pub struct MemoryHistory {
    /// Records in list order (newest first)
    entries: RwLock<Vec<HistoryRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, record: HistoryRecord) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|existing| existing.id == record.id) {
            return Err(HistoryError::DuplicateRecord(record.id));
        }

        // Ahead of every entry with an equal timestamp: latest insert wins ties.
        let position = entries.partition_point(|existing| existing.created_at > record.created_at);
        entries.insert(position, record);
        Ok(())
    }

    pub async fn list(&self) -> Vec<HistoryRecord> {
        self.entries.read().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<HistoryRecord> {
        self.entries
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    pub async fn delete(&self, ids: &[Uuid]) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|record| !ids.contains(&record.id));
        before - entries.len()
    }

    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl std::fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHistory").finish_non_exhaustive()
    }
}
