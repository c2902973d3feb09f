//! Mock social network for testing
//!
//! Records every call (optionally into a journal shared with the mock object
//! store, so tests can assert on cross-component ordering) and can be told
//! to fail any of the three calls. Available in all builds to support
//! integration tests.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::sync::{Arc, Mutex};

use super::{MediaRef, PublishedPost, SocialNetwork, StatusUpdate, UrlEntity};
use crate::CallLog;
use crate::error::SocialError;

/// First id handed out by the mock
const FIRST_POST_ID: u64 = 1_050_118_621_198_921_728;
const FIRST_MEDIA_ID: u64 = 710_511_363_345_354_753;

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialCall {
    UploadMedia { media_data: String },
    CreateMediaMetadata { media_id: String, alt_text: String },
    PostStatus(StatusUpdate),
}

#[derive(Default)]
struct State {
    calls: Vec<SocialCall>,
    issued: u64,
}

/// Recording [`SocialNetwork`]
#[derive(Clone)]
pub struct MockSocialNetwork {
    state: Arc<Mutex<State>>,
    journal: Option<CallLog>,
    created_at: DateTime<FixedOffset>,
    upload_error: Option<String>,
    metadata_error: Option<String>,
    post_error: Option<String>,
}

impl Default for MockSocialNetwork {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            journal: None,
            created_at: DateTime::parse_from_rfc3339("2018-10-10T20:19:24+00:00")
                .unwrap_or_else(|_| chrono::Utc::now().fixed_offset()),
            upload_error: None,
            metadata_error: None,
            post_error: None,
        }
    }
}

impl MockSocialNetwork {
    /// A network on which every call succeeds
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: CallLog) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Timestamp reported for every created post
    pub fn with_created_at(mut self, created_at: DateTime<FixedOffset>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn failing_upload(mut self, error: &str) -> Self {
        self.upload_error = Some(error.to_string());
        self
    }

    pub fn failing_metadata(mut self, error: &str) -> Self {
        self.metadata_error = Some(error.to_string());
        self
    }

    pub fn failing_post(mut self, error: &str) -> Self {
        self.post_error = Some(error.to_string());
        self
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<SocialCall> {
        self.lock().calls.clone()
    }

    /// Status updates made so far
    pub fn posted(&self) -> Vec<StatusUpdate> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SocialCall::PostStatus(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: SocialCall, journal_line: &str) -> u64 {
        if let Some(journal) = &self.journal {
            journal
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(journal_line.to_string());
        }
        let mut state = self.lock();
        state.calls.push(call);
        state.issued += 1;
        state.issued - 1
    }
}

fn rejected(error: &str) -> SocialError {
    SocialError::Api {
        status: 403,
        body: error.to_string(),
    }
}

/// URL entities for every http(s) token in a status, with character indices
fn extract_urls(status: &str) -> Vec<UrlEntity> {
    let mut entities = Vec::new();
    let mut offset = 0u32;

    for token in status.split(' ') {
        let len = token.chars().count() as u32;
        if token.starts_with("https://") || token.starts_with("http://") {
            entities.push(UrlEntity::new(token, offset, offset + len));
        }
        offset += len + 1;
    }

    entities
}

#[async_trait]
impl SocialNetwork for MockSocialNetwork {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn upload_media(&self, media_data: &str) -> Result<MediaRef, SocialError> {
        let sequence = self.record(
            SocialCall::UploadMedia {
                media_data: media_data.to_string(),
            },
            "network:upload_media",
        );
        if let Some(error) = &self.upload_error {
            return Err(rejected(error));
        }
        Ok(MediaRef((FIRST_MEDIA_ID + sequence).to_string()))
    }

    async fn create_media_metadata(
        &self,
        media: &MediaRef,
        alt_text: &str,
    ) -> Result<(), SocialError> {
        self.record(
            SocialCall::CreateMediaMetadata {
                media_id: media.0.clone(),
                alt_text: alt_text.to_string(),
            },
            "network:create_media_metadata",
        );
        match &self.metadata_error {
            Some(error) => Err(rejected(error)),
            None => Ok(()),
        }
    }

    async fn post_status(&self, update: &StatusUpdate) -> Result<PublishedPost, SocialError> {
        let sequence = self.record(SocialCall::PostStatus(update.clone()), "network:post_status");
        if let Some(error) = &self.post_error {
            return Err(rejected(error));
        }

        Ok(PublishedPost {
            id: (FIRST_POST_ID + sequence).to_string(),
            text: update.status.clone(),
            created_at: self.created_at,
            entity_urls: extract_urls(&update.status),
            media_id: update.media.as_ref().map(|m| m.0.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_urls_uses_character_offsets() {
        let entities = extract_urls("héllo https://example.com now");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].url, "https://example.com");
        assert_eq!(entities[0].indices, vec![6, 25]);
    }

    #[tokio::test]
    async fn failing_post_still_records_the_attempt() {
        let network = MockSocialNetwork::new().failing_post("duplicate status");
        let update = StatusUpdate {
            status: "hello".to_string(),
            media: None,
            in_reply_to: None,
        };

        let error = network.post_status(&update).await.unwrap_err();

        assert!(matches!(error, SocialError::Api { status: 403, .. }));
        assert_eq!(network.posted(), vec![update]);
    }
}
