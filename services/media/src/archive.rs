use async_trait::async_trait;
use aws_sdk_s3::{Client, primitives::ByteStream};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ArchiveError;
use crate::models::MediaSample;

/// Keeps a copy of the original upload of a signed-in user
#[async_trait]
pub trait MediaArchive: Send + Sync {
    /// Store the sample and return the key it was stored under
    async fn store(&self, owner: Uuid, sample: &MediaSample) -> Result<String, ArchiveError>;
}

pub struct S3Archive {
    s3_client: Client,
    bucket_name: String,
}

impl S3Archive {
    pub fn new(s3_client: Client, bucket_name: String) -> Self {
        Self {
            s3_client,
            bucket_name,
        }
    }

    /// `pet_images/<owner>/<file name>`, the file name reduced to a safe
    /// character set and defaulted when absent
    pub fn object_key(owner: Uuid, sample: &MediaSample) -> String {
        let name: String = sample
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit(['/', '\\']).next())
            .unwrap_or_default()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let name = name.trim_start_matches('.');

        if name.is_empty() {
            format!("pet_images/{}/{}", owner, Uuid::new_v4())
        } else {
            format!("pet_images/{}/{}", owner, name)
        }
    }
}

#[async_trait]
impl MediaArchive for S3Archive {
    async fn store(&self, owner: Uuid, sample: &MediaSample) -> Result<String, ArchiveError> {
        let key = Self::object_key(owner, sample);
        info!("Uploading original media to S3: {}", key);

        self.s3_client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(ByteStream::from(sample.bytes.clone()))
            .content_type(&sample.mime)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload {}: {}", key, e);
                ArchiveError::Upload(e.to_string())
            })?;

        Ok(key)
    }
}
