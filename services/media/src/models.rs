use image::RgbImage;

use crate::error::MediaError;

/// Top-level kind of an upload, from its declared MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// `image/*` and `video/*` are supported, nothing else
    pub fn from_mime(mime: &str) -> Option<Self> {
        let top_level = mime.split('/').next()?.trim();
        if top_level.eq_ignore_ascii_case("image") {
            Some(MediaKind::Image)
        } else if top_level.eq_ignore_ascii_case("video") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

/// Raw upload as received from the user
#[derive(Debug, Clone)]
pub struct MediaSample {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: Option<String>,
}

impl MediaSample {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            file_name: None,
        }
    }

    /// Build a sample named `file_name`, its MIME type guessed from the
    /// extension and, failing that, sniffed from the content
    pub fn from_file(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let sample = Self::new(bytes, "").with_file_name(file_name);
        match sample.extension().and_then(mime_for_extension) {
            Some(mime) => Self {
                mime: mime.to_string(),
                ..sample
            },
            None => Self {
                file_name: sample.file_name,
                ..Self::sniffed(sample.bytes)
            },
        }
    }

    /// Build a sample whose MIME type is sniffed from the content
    pub fn sniffed(bytes: Vec<u8>) -> Self {
        let mime = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("application/octet-stream");
        Self::new(bytes, mime)
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn kind(&self) -> Result<MediaKind, MediaError> {
        MediaKind::from_mime(&self.mime)
            .ok_or_else(|| MediaError::UnsupportedMediaKind(self.mime.clone()))
    }

    /// Extension of the file name, used to name temporary files
    pub fn extension(&self) -> Option<&str> {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime)
}

/// Fixed-size RGB frame handed to the classifier
#[derive(Debug, Clone)]
pub struct ImageFrame {
    image: RgbImage,
    source_offset: Option<f64>,
}

impl ImageFrame {
    pub fn new(image: RgbImage, source_offset: Option<f64>) -> Self {
        Self {
            image,
            source_offset,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Seconds into the video the frame was taken from, `None` for images
    pub fn source_offset(&self) -> Option<f64> {
        self.source_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("image/jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("Video/MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("text/plain"), None);
        assert_eq!(MediaKind::from_mime(""), None);
    }

    #[test]
    fn test_unsupported_kind_names_mime() {
        let err = MediaSample::new(b"hello".to_vec(), "text/plain").kind().unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedMediaKind(mime) if mime == "text/plain"));
    }

    #[test]
    fn test_sniffed_sample() {
        let png_magic = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(MediaSample::sniffed(png_magic).mime, "image/png");
        assert_eq!(
            MediaSample::sniffed(b"just some notes".to_vec()).mime,
            "application/octet-stream"
        );
    }

    #[test]
    fn test_from_file_guesses_by_extension() {
        assert_eq!(MediaSample::from_file(vec![], "photo.JPG").mime, "image/jpeg");
        assert_eq!(MediaSample::from_file(vec![], "clip.mp4").mime, "video/mp4");
        assert_eq!(MediaSample::from_file(vec![], "notes.txt").mime, "text/plain");

        let png_magic = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let sample = MediaSample::from_file(png_magic, "upload");
        assert_eq!(sample.mime, "image/png");
        assert_eq!(sample.file_name.as_deref(), Some("upload"));
    }

    #[test]
    fn test_extension() {
        let sample = MediaSample::new(vec![], "video/mp4").with_file_name("clip.final.mp4");
        assert_eq!(sample.extension(), Some("mp4"));
        let sample = MediaSample::new(vec![], "video/mp4").with_file_name("../weird.m p4");
        assert_eq!(sample.extension(), None);
    }
}
