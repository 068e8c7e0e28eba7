use std::path::Path;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::MediaError;

/// What ffprobe reports about a video container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoProbe {
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub video_codec: Option<String>,
    pub format: Option<String>,
}

pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Run ffprobe on `file_path` and parse its JSON report
    pub async fn probe(ffprobe: &str, file_path: &Path) -> Result<VideoProbe, MediaError> {
        debug!("Probing video file: {}", file_path.display());

        let output = Command::new(ffprobe)
            .arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(file_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::MediaDecode(format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            error!("ffprobe failed with status: {:?}", output.status);
            return Err(MediaError::MediaDecode("ffprobe could not read the video".to_string()));
        }

        let report: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| MediaError::MediaDecode(format!("unreadable ffprobe output: {}", e)))?;

        Ok(Self::parse_probe_output(&report))
    }

    /// Container duration wins over the video stream's own duration
    pub fn parse_probe_output(report: &serde_json::Value) -> VideoProbe {
        let mut probe = VideoProbe::default();

        if let Some(format) = report.get("format") {
            probe.duration = format
                .get("duration")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok());
            probe.format = format
                .get("format_name")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }

        let video_stream = report
            .get("streams")
            .and_then(|v| v.as_array())
            .and_then(|streams| {
                streams
                    .iter()
                    .find(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some("video"))
            });

        if let Some(stream) = video_stream {
            probe.width = stream.get("width").and_then(|v| v.as_u64()).map(|w| w as u32);
            probe.height = stream.get("height").and_then(|v| v.as_u64()).map(|h| h as u32);
            probe.video_codec = stream
                .get("codec_name")
                .and_then(|v| v.as_str())
                .map(str::to_string);

            if probe.duration.is_none() {
                probe.duration = stream
                    .get("duration")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<f64>().ok());
            }
        }

        probe
    }
}
