//! Mood diary model and storage abstraction
//!
//! A diary is an append-only (with delete) list of mood readings. Callers
//! talk to [`DiaryStore`] and never learn which backend holds the data:
//! a local key-value file, an in-process map or the remote PostgreSQL
//! document store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::PersistenceResult;
use crate::mood::{IntensityLevel, MoodLabel};
use crate::session::UserSession;

pub mod local;
pub mod memory;
pub mod postgres;

pub use local::LocalDiaryStore;
pub use memory::MemoryDiaryStore;
pub use postgres::PgDiaryStore;

/// Visibility scope of diary entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiaryScope {
    /// No signed-in user, entries only live in local storage
    Anonymous,
    /// Entries owned by an authenticated user
    User(Uuid),
}

impl DiaryScope {
    pub fn from_session(session: Option<&UserSession>) -> Self {
        session.map_or(DiaryScope::Anonymous, UserSession::scope)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            DiaryScope::Anonymous => None,
            DiaryScope::User(id) => Some(*id),
        }
    }
}

impl fmt::Display for DiaryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiaryScope::Anonymous => f.write_str("anonymous"),
            DiaryScope::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// A stored mood reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub mood: MoodLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<IntensityLevel>,
}

/// Entry payload before the store assigns its identity
#[derive(Debug, Clone)]
pub struct NewDiaryEntry {
    pub id: Option<Uuid>,
    pub scope: DiaryScope,
    pub timestamp: Option<DateTime<Utc>>,
    pub mood: MoodLabel,
    pub intensity: Option<IntensityLevel>,
}

impl NewDiaryEntry {
    pub fn new(scope: DiaryScope, mood: MoodLabel) -> Self {
        Self {
            id: None,
            scope,
            timestamp: None,
            mood,
            intensity: None,
        }
    }

    pub fn with_intensity(mut self, intensity: Option<IntensityLevel>) -> Self {
        self.intensity = intensity;
        self
    }

    /// Pre-assign the entry id so a retried append cannot duplicate it
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Fill in id and timestamp where the caller left them out
    pub fn into_entry(self) -> DiaryEntry {
        DiaryEntry {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            user_id: self.scope.user_id(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            mood: self.mood,
            intensity: self.intensity,
        }
    }
}

/// Read order over the same entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first, used for chart series
    Asc,
    /// Newest first, used for display
    #[default]
    Desc,
}

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Storage backend for diary entries
#[async_trait]
pub trait DiaryStore: Send + Sync {
    /// Persist an entry and return it with id and timestamp assigned.
    /// Appending an id already present in the scope returns the stored entry.
    async fn append(&self, entry: NewDiaryEntry) -> PersistenceResult<DiaryEntry>;

    /// Entries visible in `scope`, ordered by timestamp
    async fn list(&self, scope: DiaryScope, order: SortOrder) -> PersistenceResult<Vec<DiaryEntry>>;

    /// Remove one entry of `scope`
    async fn delete(&self, scope: DiaryScope, id: Uuid) -> PersistenceResult<DeleteOutcome>;

    /// Forget the scope's session-visible entries, returning how many were dropped
    async fn clear(&self, scope: DiaryScope) -> PersistenceResult<u64>;
}

/// Sort by timestamp, breaking ties by id so both orders are stable
pub fn sort_entries(entries: &mut [DiaryEntry], order: SortOrder) {
    entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    if order == SortOrder::Desc {
        entries.reverse();
    }
}
