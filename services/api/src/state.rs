//! Application state shared across handlers

use common::presentation::TipBook;
use media::MoodPipeline;
use std::sync::Arc;

use crate::middleware::TokenVerifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MoodPipeline>,
    pub tips: Arc<TipBook>,
    pub notice_dismiss_ms: u64,
    pub verifier: Arc<TokenVerifier>,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}
