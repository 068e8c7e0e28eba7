//! Still-frame extraction from video containers

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::MediaError;
use crate::metadata_extractor::MetadataExtractor;

/// Access to a video decoder
#[async_trait]
pub trait VideoDecoder: Send + Sync {
    /// Duration of the video in seconds
    async fn duration(&self, path: &Path) -> Result<f64, MediaError>;

    /// Encoded image (PNG) of the frame shown at `offset_secs`
    async fn frame_at(&self, path: &Path, offset_secs: f64) -> Result<Vec<u8>, MediaError>;
}

/// Decoder driving the `ffprobe` and `ffmpeg` binaries
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[async_trait]
impl VideoDecoder for FfmpegDecoder {
    async fn duration(&self, path: &Path) -> Result<f64, MediaError> {
        MetadataExtractor::probe(&self.ffprobe, path)
            .await?
            .duration
            .ok_or_else(|| MediaError::MediaDecode("video reports no duration".to_string()))
    }

    async fn frame_at(&self, path: &Path, offset_secs: f64) -> Result<Vec<u8>, MediaError> {
        debug!("Extracting frame at {:.3}s from {}", offset_secs, path.display());

        // Seeking before -i is frame-accurate since ffmpeg 2.1
        let output = Command::new(&self.ffmpeg)
            .arg("-v")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", offset_secs))
            .arg("-i")
            .arg(path)
            .arg("-frames:v")
            .arg("1")
            .arg("-f")
            .arg("image2pipe")
            .arg("-vcodec")
            .arg("png")
            .arg("-")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::MediaDecode(format!("failed to run ffmpeg: {}", e)))?;

        if !output.status.success() {
            error!("FFmpeg failed with status: {:?}", output.status);
            return Err(MediaError::MediaDecode(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        if output.stdout.is_empty() {
            return Err(MediaError::MediaDecode(format!(
                "no frame available at {:.3}s",
                offset_secs
            )));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_a_decode_error() {
        let decoder = FfmpegDecoder::new(
            "/nonexistent/pawmood-ffmpeg",
            "/nonexistent/pawmood-ffprobe",
        );
        let path = Path::new("/nonexistent/clip.mp4");

        assert!(matches!(
            decoder.duration(path).await,
            Err(MediaError::MediaDecode(_))
        ));
        assert!(matches!(
            decoder.frame_at(path, 1.0).await,
            Err(MediaError::MediaDecode(_))
        ));
    }
}
