//! API models for request and response payloads

use common::diary::{DiaryEntry, SortOrder};
use common::mood::MoodLabel;
use common::presentation::Notice;
use serde::{Deserialize, Serialize};

/// Response to an accepted upload
#[derive(Debug, Serialize)]
pub struct MoodResponse {
    pub entry: DiaryEntry,
    pub tip: String,
    pub notice: Notice,
}

/// Query parameters for diary listing
#[derive(Debug, Default, Deserialize)]
pub struct DiaryQuery {
    /// `desc` (newest first, default) or `asc`
    pub order: Option<SortOrder>,
}

#[derive(Debug, Serialize)]
pub struct TipResponse {
    pub mood: MoodLabel,
    pub tip: String,
}
