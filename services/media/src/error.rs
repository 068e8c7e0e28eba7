//! Error types of the mood detection pipeline

use common::diary::DiaryScope;
use common::error::PersistenceError;
use thiserror::Error;

/// Failure to turn an upload into a still frame
#[derive(Error, Debug)]
pub enum MediaError {
    /// The declared MIME type is neither image nor video
    #[error("Unsupported media kind: {0}")]
    UnsupportedMediaKind(String),

    /// The platform could not decode the file, or gave up waiting
    #[error("Could not decode media: {0}")]
    MediaDecode(String),
}

/// Failure of a classification strategy
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Label set is empty")]
    EmptyLabelSet,

    #[error("Label {0} is not part of the configured label set")]
    LabelNotInSet(String),

    /// The backing model could not be loaded or failed to run
    #[error("Classification model failed: {0}")]
    Model(String),
}

/// Failure to archive the original upload
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to upload media: {0}")]
    Upload(String),
}

/// Any failure of one upload request; the request is aborted, nothing else
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Another upload for the same scope has not finished yet
    #[error("An upload is already being processed for {0}")]
    Busy(DiaryScope),
}

/// Type alias for pipeline results
pub type PipelineResult<T> = Result<T, PipelineError>;
