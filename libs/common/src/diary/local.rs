//! Local key-value diary backend
//!
//! The file is a JSON object of key to value, the same shape browser local
//! storage would hold. The anonymous diary lives under `moodDiary`, a user's
//! diary under `moodDiary:<uuid>`. Unknown keys are preserved on write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{DeleteOutcome, DiaryEntry, DiaryScope, DiaryStore, NewDiaryEntry, SortOrder, sort_entries};
use crate::error::PersistenceResult;
use crate::mood::{IntensityLevel, MoodLabel};

/// Storage key of the anonymous diary
pub const DIARY_KEY: &str = "moodDiary";

type KeyValueFile = BTreeMap<String, serde_json::Value>;

/// On-disk record. Older files only carry `date` and `mood`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Uuid>,
    date: DateTime<Utc>,
    mood: MoodLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    intensity: Option<IntensityLevel>,
}

/// Diary persisted to a local JSON file
#[derive(Debug)]
pub struct LocalDiaryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalDiaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key_for(scope: DiaryScope) -> String {
        match scope {
            DiaryScope::Anonymous => DIARY_KEY.to_string(),
            DiaryScope::User(id) => format!("{}:{}", DIARY_KEY, id),
        }
    }

    async fn load(&self) -> PersistenceResult<KeyValueFile> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(KeyValueFile::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(KeyValueFile::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a sibling temp file so readers never see a partial file
    async fn save(&self, file: &KeyValueFile) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(file)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Entries of one scope; the flag reports whether legacy ids were filled in
    fn read_scope(file: &KeyValueFile, scope: DiaryScope) -> PersistenceResult<(Vec<DiaryEntry>, bool)> {
        let Some(value) = file.get(&Self::key_for(scope)) else {
            return Ok((Vec::new(), false));
        };
        let stored: Vec<StoredEntry> = serde_json::from_value(value.clone())?;

        let mut assigned = false;
        let entries = stored
            .into_iter()
            .map(|record| {
                let id = record.id.unwrap_or_else(|| {
                    assigned = true;
                    Uuid::new_v4()
                });
                DiaryEntry {
                    id,
                    user_id: scope.user_id(),
                    timestamp: record.date,
                    mood: record.mood,
                    intensity: record.intensity,
                }
            })
            .collect();

        Ok((entries, assigned))
    }

    fn write_scope(file: &mut KeyValueFile, scope: DiaryScope, entries: &[DiaryEntry]) -> PersistenceResult<()> {
        let key = Self::key_for(scope);
        if entries.is_empty() {
            file.remove(&key);
            return Ok(());
        }

        let stored: Vec<StoredEntry> = entries
            .iter()
            .map(|entry| StoredEntry {
                id: Some(entry.id),
                date: entry.timestamp,
                mood: entry.mood.clone(),
                intensity: entry.intensity,
            })
            .collect();
        file.insert(key, serde_json::to_value(stored)?);
        Ok(())
    }
}

#[async_trait]
impl DiaryStore for LocalDiaryStore {
    async fn append(&self, entry: NewDiaryEntry) -> PersistenceResult<DiaryEntry> {
        let _guard = self.lock.lock().await;
        let scope = entry.scope;
        let entry = entry.into_entry();

        let mut file = self.load().await?;
        let (mut entries, _) = Self::read_scope(&file, scope)?;

        if let Some(existing) = entries.iter().find(|e| e.id == entry.id) {
            debug!("Entry {} already stored in {}", entry.id, scope);
            return Ok(existing.clone());
        }

        entries.push(entry.clone());
        Self::write_scope(&mut file, scope, &entries)?;
        self.save(&file).await?;

        debug!("Appended entry {} to {} in {}", entry.id, scope, self.path.display());
        Ok(entry)
    }

    async fn list(&self, scope: DiaryScope, order: SortOrder) -> PersistenceResult<Vec<DiaryEntry>> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        let (mut entries, assigned) = Self::read_scope(&file, scope)?;

        if assigned {
            info!("Assigning ids to legacy diary records in {}", scope);
            Self::write_scope(&mut file, scope, &entries)?;
            self.save(&file).await?;
        }

        sort_entries(&mut entries, order);
        Ok(entries)
    }

    async fn delete(&self, scope: DiaryScope, id: Uuid) -> PersistenceResult<DeleteOutcome> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        let (mut entries, _) = Self::read_scope(&file, scope)?;

        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(DeleteOutcome::NotFound);
        }

        Self::write_scope(&mut file, scope, &entries)?;
        self.save(&file).await?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn clear(&self, scope: DiaryScope) -> PersistenceResult<u64> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        let (entries, _) = Self::read_scope(&file, scope)?;
        if entries.is_empty() {
            return Ok(0);
        }

        Self::write_scope(&mut file, scope, &[])?;
        self.save(&file).await?;
        info!("Cleared {} entries from {}", entries.len(), scope);
        Ok(entries.len() as u64)
    }
}
