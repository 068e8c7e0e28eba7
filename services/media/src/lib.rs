//! Mood detection pipeline
//!
//! An upload ([`MediaSample`]) is reduced to one fixed-size frame by the
//! [`Normalizer`], labelled by a [`MoodClassifier`] and recorded in a
//! [`common::diary::DiaryStore`] by the [`MoodPipeline`].

pub mod archive;
pub mod classifier;
pub mod config;
pub mod error;
pub mod frame_extractor;
pub mod metadata_extractor;
pub mod models;
pub mod normalizer;
pub mod pipeline;

pub use archive::{MediaArchive, S3Archive};
pub use classifier::{FixedStrategy, ImageModel, ModelStrategy, MoodClassifier, UniformRandomStrategy};
pub use config::{PipelineConfig, RetryPolicy, StrategyKind};
pub use error::{ArchiveError, ClassificationError, MediaError, PipelineError, PipelineResult};
pub use frame_extractor::{FfmpegDecoder, VideoDecoder};
pub use models::{ImageFrame, MediaKind, MediaSample};
pub use normalizer::Normalizer;
pub use pipeline::{MoodPipeline, MoodReading, MoodRequest};
