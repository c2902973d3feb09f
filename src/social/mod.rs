//! Social network abstraction
//!
//! The pipeline talks to a network through [`SocialNetwork`]: upload an
//! image, attach alt text to it, create a status. [`TwitterClient`] is the
//! production implementation; [`MockSocialNetwork`] records calls for tests.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::SocialError;

pub mod mock;
pub mod oauth;
pub mod twitter;

pub use mock::{MockSocialNetwork, SocialCall};
pub use twitter::TwitterClient;

/// Platform-issued id of an uploaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A status to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: String,
    /// Attached media; sent as an empty `media_ids` when absent
    pub media: Option<MediaRef>,
    /// Id of the status this one replies to
    pub in_reply_to: Option<String>,
}

impl StatusUpdate {
    /// Value of the `media_ids` parameter
    pub fn media_ids(&self) -> &str {
        self.media.as_ref().map(MediaRef::as_str).unwrap_or("")
    }
}

/// URL entity as returned by the network
///
/// Unknown fields are kept so the ledger stores exactly what the network sent.
/// The outer `Option` of `expanded_url`/`display_url` records whether the
/// field was present at all; the inner one whether it was `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlEntity {
    pub url: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub expanded_url: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_url: Option<Option<String>>,
    #[serde(default)]
    pub indices: Vec<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UrlEntity {
    /// Entity for a URL found at `start..end` in a status (characters, not bytes)
    pub fn new(url: &str, start: u32, end: u32) -> Self {
        Self {
            url: url.to_string(),
            expanded_url: Some(Some(url.to_string())),
            display_url: Some(Some(
                url.trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .to_string(),
            )),
            indices: vec![start, end],
            extra: serde_json::Map::new(),
        }
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Created post as acknowledged by the network
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedPost {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<FixedOffset>,
    pub entity_urls: Vec<UrlEntity>,
    pub media_id: Option<String>,
}

/// Social network client contract
#[async_trait]
pub trait SocialNetwork: Send + Sync {
    /// Lowercase network name, used in logs and metrics
    fn name(&self) -> &str;

    /// Upload base64-encoded image bytes
    async fn upload_media(&self, media_data: &str) -> Result<MediaRef, SocialError>;

    /// Attach alt text to an uploaded image
    async fn create_media_metadata(
        &self,
        media: &MediaRef,
        alt_text: &str,
    ) -> Result<(), SocialError>;

    /// Create a status
    async fn post_status(&self, update: &StatusUpdate) -> Result<PublishedPost, SocialError>;
}
