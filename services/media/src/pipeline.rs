//! Upload to diary entry: normalize, classify, then append.
//!
//! Each request runs its stages strictly in order and stops at the first
//! failure, so a rejected upload never leaves an entry behind. Only one
//! request per diary scope may be in flight at a time.

use common::diary::{DiaryEntry, DiaryScope, DiaryStore, NewDiaryEntry};
use common::error::PersistenceResult;
use common::mood::{IntensityLevel, LabelSet};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::archive::MediaArchive;
use crate::classifier::MoodClassifier;
use crate::config::{PipelineConfig, RetryPolicy};
use crate::error::{PipelineError, PipelineResult};
use crate::models::MediaSample;
use crate::normalizer::Normalizer;

/// One upload to classify and record
#[derive(Debug, Clone)]
pub struct MoodRequest {
    pub scope: DiaryScope,
    pub sample: MediaSample,
    pub intensity: Option<IntensityLevel>,
}

impl MoodRequest {
    pub fn new(scope: DiaryScope, sample: MediaSample) -> Self {
        Self {
            scope,
            sample,
            intensity: None,
        }
    }

    pub fn with_intensity(mut self, intensity: Option<IntensityLevel>) -> Self {
        self.intensity = intensity;
        self
    }
}

/// Outcome of a successful request
#[derive(Debug, Clone)]
pub struct MoodReading {
    pub entry: DiaryEntry,
    /// Where the original upload was archived, if it was
    pub archived_key: Option<String>,
}

/// Marks a scope busy until dropped
struct InFlight {
    scopes: Arc<Mutex<HashSet<DiaryScope>>>,
    scope: DiaryScope,
}

impl InFlight {
    fn acquire(scopes: &Arc<Mutex<HashSet<DiaryScope>>>, scope: DiaryScope) -> Option<Self> {
        let inserted = scopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(scope);
        inserted.then(|| Self {
            scopes: scopes.clone(),
            scope,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.scopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.scope);
    }
}

pub struct MoodPipeline {
    normalizer: Normalizer,
    classifier: Arc<dyn MoodClassifier>,
    labels: LabelSet,
    store: Arc<dyn DiaryStore>,
    archive: Option<Arc<dyn MediaArchive>>,
    retry: RetryPolicy,
    in_flight: Arc<Mutex<HashSet<DiaryScope>>>,
}

impl MoodPipeline {
    pub fn new(
        normalizer: Normalizer,
        classifier: Arc<dyn MoodClassifier>,
        labels: LabelSet,
        store: Arc<dyn DiaryStore>,
    ) -> Self {
        Self {
            normalizer,
            classifier,
            labels,
            store,
            archive: None,
            retry: RetryPolicy::none(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn from_config(config: &PipelineConfig, store: Arc<dyn DiaryStore>) -> Self {
        Self::new(
            Normalizer::from_config(config),
            config.build_classifier(),
            config.labels.clone(),
            store,
        )
        .with_retry(config.retry.clone())
    }

    /// Archive uploads of signed-in users
    pub fn with_archive(mut self, archive: Arc<dyn MediaArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn DiaryStore> {
        &self.store
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub async fn run(&self, request: MoodRequest) -> PipelineResult<MoodReading> {
        let MoodRequest {
            scope,
            sample,
            intensity,
        } = request;

        sample.kind()?;
        let _in_flight =
            InFlight::acquire(&self.in_flight, scope).ok_or(PipelineError::Busy(scope))?;

        info!("Processing {} upload for {}", sample.mime, scope);

        let frame = self.normalizer.normalize(&sample).await.map_err(|e| {
            error!("Normalization failed for {}: {}", scope, e);
            e
        })?;

        let mood = self
            .classifier
            .classify(&frame, &self.labels)
            .await
            .map_err(|e| {
                error!("Classification failed for {}: {}", scope, e);
                e
            })?;

        let archived_key = match (&self.archive, scope.user_id()) {
            (Some(archive), Some(owner)) => Some(archive.store(owner, &sample).await?),
            _ => None,
        };

        let new_entry = NewDiaryEntry::new(scope, mood)
            .with_intensity(intensity)
            .with_id(Uuid::new_v4());
        let entry = self.append_with_retry(new_entry).await.map_err(|e| {
            error!("Failed to record mood for {}: {}", scope, e);
            e
        })?;

        info!("Recorded {} for {} ({})", entry.mood, scope, entry.id);
        Ok(MoodReading {
            entry,
            archived_key,
        })
    }

    /// The entry id is fixed before the first attempt, so an append that
    /// landed but whose acknowledgement was lost is not duplicated.
    async fn append_with_retry(&self, entry: NewDiaryEntry) -> PersistenceResult<DiaryEntry> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.store.append(entry.clone()).await {
                Ok(stored) => return Ok(stored),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Append attempt {}/{} failed: {}, retrying in {:?}",
                        attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
