//! Remote diary backend on PostgreSQL
//!
//! Each operation runs in a transaction that first sets `app.user_id`. The
//! `mood_entries` table has forced row-level security keyed on that setting,
//! so a query can only ever see rows of the scope's user even if a filter
//! were missing. Queries still filter on `user_id` explicitly.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::{debug, info};
use uuid::Uuid;

use super::{DeleteOutcome, DiaryEntry, DiaryScope, DiaryStore, NewDiaryEntry, SortOrder};
use crate::error::{PersistenceError, PersistenceResult};
use crate::mood::{IntensityLevel, MoodLabel};

/// Diary stored in the `mood_entries` table
#[derive(Clone)]
pub struct PgDiaryStore {
    pool: PgPool,
}

impl PgDiaryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn require_user(scope: DiaryScope) -> PersistenceResult<Uuid> {
        scope.user_id().ok_or_else(|| {
            PersistenceError::InvalidScope("the remote diary requires a signed-in user".to_string())
        })
    }

    /// Begin a transaction bound to one user for row-level security
    async fn scoped(&self, user_id: Uuid) -> PersistenceResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('app.user_id', $1, true)")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    fn map_row(row: &PgRow) -> PersistenceResult<DiaryEntry> {
        let mood: String = row.get("mood");
        let intensity: Option<i16> = row.get("intensity");

        Ok(DiaryEntry {
            id: row.get("id"),
            user_id: Some(row.get("user_id")),
            timestamp: row.get("recorded_at"),
            mood: MoodLabel::new(mood).map_err(|e| PersistenceError::Corrupt(e.to_string()))?,
            intensity: intensity
                .map(|value| IntensityLevel::try_from(value as i64))
                .transpose()
                .map_err(|e| PersistenceError::Corrupt(e.to_string()))?,
        })
    }
}

#[async_trait]
impl DiaryStore for PgDiaryStore {
    async fn append(&self, entry: NewDiaryEntry) -> PersistenceResult<DiaryEntry> {
        let user_id = Self::require_user(entry.scope)?;
        let entry = entry.into_entry();
        let mut tx = self.scoped(user_id).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO mood_entries (id, user_id, mood, intensity, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(entry.id)
        .bind(user_id)
        .bind(entry.mood.as_str())
        .bind(entry.intensity.map(|level| level.value() as i16))
        .bind(entry.timestamp)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let row = sqlx::query(
            r#"
            SELECT id, user_id, mood, intensity, recorded_at
            FROM mood_entries
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(entry.id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(PersistenceError::Conflict(entry.id))?;

        let stored = Self::map_row(&row)?;
        tx.commit().await?;

        if inserted == 0 {
            debug!("Entry {} was already stored for user {}", stored.id, user_id);
        }
        Ok(stored)
    }

    async fn list(&self, scope: DiaryScope, order: SortOrder) -> PersistenceResult<Vec<DiaryEntry>> {
        let user_id = Self::require_user(scope)?;
        let query = match order {
            SortOrder::Asc => {
                r#"
                SELECT id, user_id, mood, intensity, recorded_at
                FROM mood_entries
                WHERE user_id = $1
                ORDER BY recorded_at ASC, id ASC
                "#
            }
            SortOrder::Desc => {
                r#"
                SELECT id, user_id, mood, intensity, recorded_at
                FROM mood_entries
                WHERE user_id = $1
                ORDER BY recorded_at DESC, id DESC
                "#
            }
        };

        let mut tx = self.scoped(user_id).await?;
        let rows = sqlx::query(query).bind(user_id).fetch_all(&mut *tx).await?;
        tx.commit().await?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn delete(&self, scope: DiaryScope, id: Uuid) -> PersistenceResult<DeleteOutcome> {
        let user_id = Self::require_user(scope)?;
        let mut tx = self.scoped(user_id).await?;

        let deleted = sqlx::query("DELETE FROM mood_entries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        if deleted > 0 {
            info!("Deleted diary entry {} for user {}", id, user_id);
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }

    async fn clear(&self, scope: DiaryScope) -> PersistenceResult<u64> {
        // Sign-out only drops what the client shows; remote rows stay.
        Self::require_user(scope)?;
        debug!("Clear requested for {}, remote entries are kept", scope);
        Ok(0)
    }
}
