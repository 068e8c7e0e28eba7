//! Reduces an image or video upload to one fixed-size RGB frame

use image::imageops::FilterType;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::error::MediaError;
use crate::frame_extractor::{FfmpegDecoder, VideoDecoder};
use crate::models::{ImageFrame, MediaKind, MediaSample};

pub struct Normalizer {
    width: u32,
    height: u32,
    decode_timeout: Duration,
    video: Arc<dyn VideoDecoder>,
}

impl Normalizer {
    pub fn new(width: u32, height: u32, decode_timeout: Duration, video: Arc<dyn VideoDecoder>) -> Self {
        Self {
            width,
            height,
            decode_timeout,
            video,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let decoder = FfmpegDecoder::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone());
        Self::new(
            config.frame_width,
            config.frame_height,
            config.decode_timeout(),
            Arc::new(decoder),
        )
    }

    /// Turn `sample` into a frame at the configured resolution.
    ///
    /// Unsupported kinds fail before any decoding starts. Everything after
    /// that runs under the decode timeout.
    pub async fn normalize(&self, sample: &MediaSample) -> Result<ImageFrame, MediaError> {
        let kind = sample.kind()?;
        debug!("Normalizing {:?} upload of {} bytes", kind, sample.bytes.len());

        let work = async {
            match kind {
                MediaKind::Image => self.frame_from_image(sample.bytes.clone(), None).await,
                MediaKind::Video => self.frame_from_video(sample).await,
            }
        };

        match tokio::time::timeout(self.decode_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                error!("Decoding timed out after {:?}", self.decode_timeout);
                Err(MediaError::MediaDecode(format!(
                    "decoding did not finish within {} ms",
                    self.decode_timeout.as_millis()
                )))
            }
        }
    }

    async fn frame_from_image(
        &self,
        bytes: Vec<u8>,
        source_offset: Option<f64>,
    ) -> Result<ImageFrame, MediaError> {
        let (width, height) = (self.width, self.height);

        let image = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes)
                .map(|decoded| decoded.resize_exact(width, height, FilterType::Triangle).to_rgb8())
        })
        .await
        .map_err(|e| MediaError::MediaDecode(format!("decode task failed: {}", e)))?
        .map_err(|e| MediaError::MediaDecode(e.to_string()))?;

        Ok(ImageFrame::new(image, source_offset))
    }

    async fn frame_from_video(&self, sample: &MediaSample) -> Result<ImageFrame, MediaError> {
        // Removed when `file` is dropped, on success and on every error path
        let mut file = tempfile::Builder::new()
            .prefix("pawmood-")
            .suffix(&format!(".{}", sample.extension().unwrap_or("video")))
            .tempfile()
            .map_err(|e| MediaError::MediaDecode(format!("failed to create temp file: {}", e)))?;
        file.write_all(&sample.bytes)
            .and_then(|_| file.flush())
            .map_err(|e| MediaError::MediaDecode(format!("failed to write temp file: {}", e)))?;

        let duration = self.video.duration(file.path()).await?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(MediaError::MediaDecode(format!(
                "video has no usable duration ({})",
                duration
            )));
        }

        let offset = duration / 2.0;
        info!("Extracting frame at {:.3}s of a {:.3}s video", offset, duration);

        let encoded = self.video.frame_at(file.path(), offset).await?;
        self.frame_from_image(encoded, Some(offset)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 120, 40]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    /// Decoder reporting a fixed duration and recording the requested offsets
    struct FakeDecoder {
        duration: f64,
        requested: Mutex<Vec<f64>>,
        seen_paths: Mutex<Vec<PathBuf>>,
    }

    impl FakeDecoder {
        fn new(duration: f64) -> Self {
            Self {
                duration,
                requested: Mutex::new(Vec::new()),
                seen_paths: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VideoDecoder for FakeDecoder {
        async fn duration(&self, path: &Path) -> Result<f64, MediaError> {
            assert!(path.exists());
            self.seen_paths.lock().unwrap().push(path.to_path_buf());
            Ok(self.duration)
        }

        async fn frame_at(&self, _path: &Path, offset_secs: f64) -> Result<Vec<u8>, MediaError> {
            self.requested.lock().unwrap().push(offset_secs);
            Ok(png_bytes(640, 360))
        }
    }

    struct StalledDecoder;

    #[async_trait]
    impl VideoDecoder for StalledDecoder {
        async fn duration(&self, _path: &Path) -> Result<f64, MediaError> {
            std::future::pending().await
        }

        async fn frame_at(&self, _path: &Path, _offset_secs: f64) -> Result<Vec<u8>, MediaError> {
            std::future::pending().await
        }
    }

    fn normalizer(video: Arc<dyn VideoDecoder>) -> Normalizer {
        Normalizer::new(224, 224, Duration::from_secs(10), video)
    }

    #[tokio::test]
    async fn test_image_is_resized_to_frame_size() {
        let sample = MediaSample::new(png_bytes(800, 600), "image/png");
        let frame = normalizer(Arc::new(FakeDecoder::new(1.0)))
            .normalize(&sample)
            .await
            .unwrap();

        assert_eq!((frame.width(), frame.height()), (224, 224));
        assert_eq!(frame.source_offset(), None);
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_rejected_before_decoding() {
        let decoder = Arc::new(FakeDecoder::new(1.0));
        let sample = MediaSample::new(b"dear diary".to_vec(), "text/plain");

        let err = normalizer(decoder.clone()).normalize(&sample).await.unwrap_err();

        assert!(matches!(err, MediaError::UnsupportedMediaKind(_)));
        assert!(decoder.seen_paths.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_image_is_a_decode_error() {
        let sample = MediaSample::new(vec![0xFF, 0xD8, 0x00, 0x01], "image/jpeg");
        let err = normalizer(Arc::new(FakeDecoder::new(1.0)))
            .normalize(&sample)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MediaDecode(_)));
    }

    #[tokio::test]
    async fn test_video_frame_is_taken_at_midpoint() {
        let decoder = Arc::new(FakeDecoder::new(10.0));
        let sample = MediaSample::new(vec![0; 64], "video/mp4").with_file_name("clip.mp4");

        let frame = normalizer(decoder.clone()).normalize(&sample).await.unwrap();

        assert_eq!(*decoder.requested.lock().unwrap(), vec![5.0]);
        assert_eq!(frame.source_offset(), Some(5.0));
        assert_eq!((frame.width(), frame.height()), (224, 224));

        let paths = decoder.seen_paths.lock().unwrap();
        assert!(paths[0].to_string_lossy().ends_with(".mp4"));
        assert!(!paths[0].exists(), "temporary video file was left behind");
    }

    #[tokio::test]
    async fn test_zero_length_video_is_a_decode_error() {
        let decoder = Arc::new(FakeDecoder::new(0.0));
        let sample = MediaSample::new(vec![0; 64], "video/webm");

        let err = normalizer(decoder.clone()).normalize(&sample).await.unwrap_err();

        assert!(matches!(err, MediaError::MediaDecode(_)));
        assert!(decoder.requested.lock().unwrap().is_empty());
        assert!(!decoder.seen_paths.lock().unwrap()[0].exists());
    }

    #[tokio::test]
    async fn test_stalled_decoder_times_out() {
        let normalizer = Normalizer::new(
            224,
            224,
            Duration::from_millis(50),
            Arc::new(StalledDecoder),
        );
        let sample = MediaSample::new(vec![0; 64], "video/mp4");

        let err = normalizer.normalize(&sample).await.unwrap_err();
        assert!(matches!(err, MediaError::MediaDecode(msg) if msg.contains("50 ms")));
    }
}
