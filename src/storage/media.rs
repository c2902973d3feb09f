//! Media archive
//!
//! Copies posted images into the media bucket under a key derived from the
//! post's platform id.

use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use std::sync::Arc;

use super::{ObjectStore, PutOptions};
use crate::config::MediaConfig;
use crate::error::ArchiveError;

/// Standard alphabet; padding optional, trailing bits ignored
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decode request image data, ignoring embedded line breaks and spaces
pub fn decode_image(image: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = image
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(compact)
}

/// Where an image ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedMedia {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub size: usize,
}

/// Media archive service
pub struct MediaArchive {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key_prefix: String,
    public_read: bool,
}

impl MediaArchive {
    pub fn new(store: Arc<dyn ObjectStore>, config: &MediaConfig) -> Self {
        Self {
            store,
            bucket: config.bucket.clone(),
            key_prefix: config.key_prefix.clone(),
            public_read: config.public_read,
        }
    }

    /// Decode a base64 image and store it at `<key_prefix><key>`
    ///
    /// # Arguments
    /// * `image` - base64-encoded image bytes, as received in the request
    /// * `key` - platform id of the post (tweet id or Instagram id)
    ///
    /// # Errors
    /// `ArchiveError::Decode` for malformed base64, `ArchiveError::Storage` when the put fails.
    pub async fn archive(&self, image: &str, key: &str) -> Result<ArchivedMedia, ArchiveError> {
        let data = decode_image(image)?;
        let object_key = format!("{}{}", self.key_prefix, key);
        let content_type = content_type_for_key(key);
        let size = data.len();

        self.store
            .put_object(
                &self.bucket,
                &object_key,
                data,
                PutOptions::default()
                    .content_type(content_type)
                    .public_read(self.public_read),
            )
            .await
            .map_err(ArchiveError::Storage)?;

        crate::metrics::MEDIA_BYTES_ARCHIVED.inc_by(size as f64);
        tracing::info!(bucket = %self.bucket, key = %object_key, size, "Media archived");

        Ok(ArchivedMedia {
            bucket: self.bucket.clone(),
            key: object_key,
            content_type: content_type.to_string(),
            size,
        })
    }
}

/// MIME type from a key's file extension
pub fn content_type_for_key(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}
