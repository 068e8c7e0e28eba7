//! In-process diary backend

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{DeleteOutcome, DiaryEntry, DiaryScope, DiaryStore, NewDiaryEntry, SortOrder, sort_entries};
use crate::error::PersistenceResult;

/// Diary kept in memory, lost when the process exits
#[derive(Debug, Clone, Default)]
pub struct MemoryDiaryStore {
    scopes: Arc<RwLock<HashMap<DiaryScope, Vec<DiaryEntry>>>>,
}

impl MemoryDiaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiaryStore for MemoryDiaryStore {
    async fn append(&self, entry: NewDiaryEntry) -> PersistenceResult<DiaryEntry> {
        let scope = entry.scope;
        let entry = entry.into_entry();
        let mut scopes = self.scopes.write().await;
        let entries = scopes.entry(scope).or_default();

        if let Some(existing) = entries.iter().find(|e| e.id == entry.id) {
            debug!("Entry {} already stored in {}", entry.id, scope);
            return Ok(existing.clone());
        }

        entries.push(entry.clone());
        Ok(entry)
    }

    async fn list(&self, scope: DiaryScope, order: SortOrder) -> PersistenceResult<Vec<DiaryEntry>> {
        let scopes = self.scopes.read().await;
        let mut entries = scopes.get(&scope).cloned().unwrap_or_default();
        sort_entries(&mut entries, order);
        Ok(entries)
    }

    async fn delete(&self, scope: DiaryScope, id: Uuid) -> PersistenceResult<DeleteOutcome> {
        let mut scopes = self.scopes.write().await;
        let Some(entries) = scopes.get_mut(&scope) else {
            return Ok(DeleteOutcome::NotFound);
        };

        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() < before {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }

    async fn clear(&self, scope: DiaryScope) -> PersistenceResult<u64> {
        let mut scopes = self.scopes.write().await;
        Ok(scopes.remove(&scope).map_or(0, |entries| entries.len() as u64))
    }
}
