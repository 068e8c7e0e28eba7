//! Mood labels, label sets and intensity levels
//!
//! Labels are configuration data: the default set is
//! `happy, sad, anxious, relaxed`, but any non-empty set of distinct
//! labels can be supplied. Comparisons ignore ASCII case.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while building mood values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoodError {
    #[error("Mood label must not be empty")]
    EmptyLabel,

    #[error("Label set must contain at least one label")]
    EmptyLabelSet,

    #[error("Duplicate mood label: {0}")]
    DuplicateLabel(String),

    #[error("Intensity {0} is outside the 1-10 range")]
    IntensityOutOfRange(i64),
}

/// A single mood label such as `happy`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoodLabel(String);

impl MoodLabel {
    /// Create a label, trimming surrounding whitespace
    pub fn new(label: impl Into<String>) -> Result<Self, MoodError> {
        let label = label.into();
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Err(MoodError::EmptyLabel);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a raw label
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed, ordered set of labels a classifier may produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet {
    labels: Vec<MoodLabel>,
}

impl LabelSet {
    pub fn new(labels: Vec<MoodLabel>) -> Result<Self, MoodError> {
        if labels.is_empty() {
            return Err(MoodError::EmptyLabelSet);
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].iter().any(|seen| seen.matches(label.as_str())) {
                return Err(MoodError::DuplicateLabel(label.to_string()));
            }
        }
        Ok(Self { labels })
    }

    /// `Happy, Sad, Excited, Relaxed`, used by the first diary release
    pub fn excited_variant() -> Self {
        Self::from_static(&["Happy", "Sad", "Excited", "Relaxed"])
    }

    fn from_static(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|l| MoodLabel(l.to_string())).collect(),
        }
    }

    pub fn labels(&self) -> &[MoodLabel] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Find the canonical label for a raw string, ignoring case
    pub fn resolve(&self, raw: &str) -> Option<&MoodLabel> {
        self.labels.iter().find(|label| label.matches(raw))
    }

    pub fn contains(&self, label: &MoodLabel) -> bool {
        self.resolve(label.as_str()).is_some()
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::from_static(&["happy", "sad", "anxious", "relaxed"])
    }
}

impl TryFrom<Vec<String>> for LabelSet {
    type Error = MoodError;

    fn try_from(raw: Vec<String>) -> Result<Self, Self::Error> {
        let labels = raw
            .into_iter()
            .map(MoodLabel::new)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(labels)
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(set: LabelSet) -> Self {
        set.labels.into_iter().map(|l| l.0).collect()
    }
}

/// User-supplied intensity attached to a reading, 1 to 10 inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct IntensityLevel(u8);

impl IntensityLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for IntensityLevel {
    type Error = MoodError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(MoodError::IntensityOutOfRange(value))
        }
    }
}

impl TryFrom<u8> for IntensityLevel {
    type Error = MoodError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from(value as i64)
    }
}

impl From<IntensityLevel> for i64 {
    fn from(level: IntensityLevel) -> Self {
        level.0 as i64
    }
}

impl fmt::Display for IntensityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
