//! Data side of the diary presentation: care tips, chart series, notices
//! and the per-session diary view.
//!
//! Rendering itself belongs to whatever front end consumes these values.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::diary::{DiaryEntry, DiaryScope, DiaryStore, SortOrder};
use crate::error::PersistenceResult;
use crate::mood::{IntensityLevel, MoodLabel};
use crate::session::UserSession;

/// How long a notice stays visible before the front end hides it
pub const DEFAULT_DISMISS_MS: u64 = 3000;

const FALLBACK_TIP: &str = "Spend quality time with your pet to understand their needs better.";

/// Candidate care tips per mood label
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawTipBook")]
pub struct TipBook {
    tips: HashMap<String, Vec<String>>,
    fallback: String,
}

#[derive(Deserialize)]
struct RawTipBook {
    tips: HashMap<String, Vec<String>>,
    #[serde(default = "default_fallback")]
    fallback: String,
}

impl From<RawTipBook> for TipBook {
    fn from(raw: RawTipBook) -> Self {
        TipBook::new(raw.tips, raw.fallback)
    }
}

fn default_fallback() -> String {
    FALLBACK_TIP.to_string()
}

impl TipBook {
    /// Keys are matched case-insensitively
    pub fn new(tips: HashMap<String, Vec<String>>, fallback: impl Into<String>) -> Self {
        let tips = tips
            .into_iter()
            .map(|(label, candidates)| (label.to_lowercase(), candidates))
            .collect();
        Self {
            tips,
            fallback: fallback.into(),
        }
    }

    pub fn tips_for(&self, label: &MoodLabel) -> &[String] {
        self.tips
            .get(&label.as_str().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// One tip for the label, drawn from `rng`
    pub fn pick<R: Rng + ?Sized>(&self, label: &MoodLabel, rng: &mut R) -> &str {
        self.tips_for(label)
            .choose(rng)
            .map(String::as_str)
            .unwrap_or(self.fallback.as_str())
    }

    pub fn pick_random(&self, label: &MoodLabel) -> &str {
        self.pick(label, &mut rand::thread_rng())
    }
}

impl Default for TipBook {
    fn default() -> Self {
        let table: [(&str, &[&str]); 5] = [
            (
                "happy",
                &[
                    "Keep up the good work! Regular playtime and cuddles will maintain your pet's happiness.",
                    "Your pet is in great spirits. Reward the mood with a favourite treat or a new game.",
                    "A happy pet loves company. Plan a walk or a play session together today.",
                ],
            ),
            (
                "sad",
                &[
                    "Spend extra time with your pet today. Consider new toys or activities to lift their spirits.",
                    "Gentle attention helps. Sit with your pet and keep their routine predictable.",
                    "If the low mood lasts several days, a check-up with the vet is a good idea.",
                ],
            ),
            (
                "anxious",
                &[
                    "Give your pet a quiet, safe corner and keep loud noises to a minimum.",
                    "Calm, slow movements and a familiar blanket can help an anxious pet settle.",
                    "Short, predictable walks and consistent feeding times reduce stress.",
                ],
            ),
            (
                "relaxed",
                &[
                    "Your pet is content. This is a good time for gentle grooming or quiet bonding.",
                    "Enjoy the calm. A soft brush or a slow stroll keeps the relaxed mood going.",
                ],
            ),
            (
                "excited",
                &[
                    "Channel that energy into fun games or training sessions. It's a great time for learning!",
                    "An excited pet needs an outlet. Try fetch, tug or a puzzle feeder.",
                ],
            ),
        ];

        let tips = table
            .iter()
            .map(|(label, candidates)| {
                (
                    label.to_string(),
                    candidates.iter().map(|tip| tip.to_string()).collect(),
                )
            })
            .collect();
        Self::new(tips, FALLBACK_TIP)
    }
}

/// Kind of transient message shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Message,
    Error,
}

/// Message that the front end hides after `dismiss_after_ms`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    pub dismiss_after_ms: u64,
}

impl Notice {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Message,
            text: text.into(),
            dismiss_after_ms: DEFAULT_DISMISS_MS,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
            dismiss_after_ms: DEFAULT_DISMISS_MS,
        }
    }

    pub fn dismiss_after(mut self, ms: u64) -> Self {
        self.dismiss_after_ms = ms;
        self
    }
}

/// One point of the mood-over-time chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub timestamp: DateTime<Utc>,
    pub mood: MoodLabel,
    pub intensity: Option<IntensityLevel>,
}

/// Chart series in ascending time order, whatever order `entries` came in
pub fn chart_series(entries: &[DiaryEntry]) -> Vec<ChartPoint> {
    let mut points: Vec<ChartPoint> = entries
        .iter()
        .map(|entry| ChartPoint {
            timestamp: entry.timestamp,
            mood: entry.mood.clone(),
            intensity: entry.intensity,
        })
        .collect();
    points.sort_by_key(|point| point.timestamp);
    points
}

/// Diary state shown for the current session
#[derive(Debug, Default)]
pub struct DiaryView {
    session: Option<UserSession>,
    entries: Vec<DiaryEntry>,
}

impl DiaryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&UserSession> {
        self.session.as_ref()
    }

    pub fn scope(&self) -> DiaryScope {
        DiaryScope::from_session(self.session.as_ref())
    }

    /// Entries newest first
    pub fn entries(&self) -> &[DiaryEntry] {
        &self.entries
    }

    pub fn chart(&self) -> Vec<ChartPoint> {
        chart_series(&self.entries)
    }

    /// Replace the view with the diary of `session`
    pub async fn sign_in(&mut self, session: UserSession, store: &dyn DiaryStore) -> PersistenceResult<()> {
        self.entries.clear();
        self.session = Some(session);
        self.refresh(store).await
    }

    /// Drop everything shown; persisted entries are untouched
    pub fn sign_out(&mut self) {
        self.session = None;
        self.entries.clear();
    }

    /// Reload from the store, to be called after an append has completed
    pub async fn refresh(&mut self, store: &dyn DiaryStore) -> PersistenceResult<()> {
        self.entries = store.list(self.scope(), SortOrder::Desc).await?;
        Ok(())
    }

    /// Show a freshly appended entry; entries of other scopes are ignored
    pub fn record(&mut self, entry: DiaryEntry) {
        if entry.user_id != self.scope().user_id() {
            return;
        }
        self.entries.insert(0, entry);
    }
}
