//! Posting pipeline
//!
//! One invocation runs strictly in sequence and stops at the first failing
//! step:
//!
//! - twitter: upload image (optional) → publish → archive image → ledger append
//! - instagram: archive image → ledger append
//!
//! Both entry points share this pipeline; [`PipelineVariant`] decides which
//! networks are accepted and whether images are archived.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{PipelineError, PublishError, UploadError};
use crate::ledger::{AppendReceipt, Ledger, LedgerRow};
use crate::social::{MediaRef, PublishedPost, SocialNetwork, StatusUpdate};
use crate::storage::MediaArchive;

/// Target network of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Twitter,
    Instagram,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Twitter => "twitter",
            Network::Instagram => "instagram",
        }
    }
}

/// Invocation body
#[derive(Debug, Clone, Deserialize)]
pub struct PostRequest {
    pub network: Network,
    pub status: String,
    /// Base64-encoded image
    #[serde(default)]
    pub image: Option<String>,
    /// Alt text for the image
    #[serde(default)]
    pub alt: Option<String>,
    /// Id of the tweet to reply to
    #[serde(default)]
    pub reply: Option<String>,
    /// Id of an Instagram post to record
    #[serde(default)]
    pub instagram_id: Option<String>,
}

impl PostRequest {
    /// The image, treating an empty string as absent
    pub fn image(&self) -> Option<&str> {
        non_empty(self.image.as_deref())
    }

    pub fn reply(&self) -> Option<&str> {
        non_empty(self.reply.as_deref())
    }

    pub fn instagram_id(&self) -> Option<&str> {
        non_empty(self.instagram_id.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

/// Which entry point a pipeline serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineVariant {
    /// `post-to-social`: twitter and instagram, images archived
    Social,
    /// `post-tweet-only`: twitter only, images not archived
    TweetOnly,
}

impl PipelineVariant {
    pub fn entry_point(&self) -> &'static str {
        match self {
            PipelineVariant::Social => "post-to-social",
            PipelineVariant::TweetOnly => "post-tweet-only",
        }
    }

    pub fn accepts(&self, network: Network) -> bool {
        match self {
            PipelineVariant::Social => true,
            PipelineVariant::TweetOnly => network == Network::Twitter,
        }
    }
}

/// Successful invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub network: Network,
    /// Tweet id or Instagram id
    pub post_id: String,
    pub receipt: AppendReceipt,
}

/// Posting pipeline for one entry point
pub struct Pipeline {
    variant: PipelineVariant,
    network: Arc<dyn SocialNetwork>,
    archive: Option<Arc<MediaArchive>>,
    ledger: Arc<dyn Ledger>,
}

impl Pipeline {
    /// Create a pipeline
    ///
    /// `archive` is only used by [`PipelineVariant::Social`].
    pub fn new(
        variant: PipelineVariant,
        network: Arc<dyn SocialNetwork>,
        archive: Option<Arc<MediaArchive>>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        let archive = match variant {
            PipelineVariant::Social => archive,
            PipelineVariant::TweetOnly => None,
        };

        Self {
            variant,
            network,
            archive,
            ledger,
        }
    }

    pub fn variant(&self) -> PipelineVariant {
        self.variant
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Run one invocation
    pub async fn run(&self, request: &PostRequest) -> Result<Outcome, PipelineError> {
        let entry_point = self.variant.entry_point();
        crate::metrics::INVOCATIONS_TOTAL
            .with_label_values(&[entry_point, request.network.as_str()])
            .inc();
        let timer = crate::metrics::PIPELINE_DURATION_SECONDS
            .with_label_values(&[entry_point])
            .start_timer();

        let result = match request.network {
            _ if !self.variant.accepts(request.network) => Err(PipelineError::InvalidRequest(
                format!("{} does not accept {} posts", entry_point, request.network.as_str()),
            )),
            Network::Twitter => self.run_tweet(request).await,
            Network::Instagram => self.run_instagram(request).await,
        };
        timer.observe_duration();

        match &result {
            Ok(outcome) => {
                tracing::info!(
                    entry_point,
                    network = outcome.network.as_str(),
                    post_id = %outcome.post_id,
                    ledger_key = %outcome.receipt.key,
                    "Post recorded"
                );
            }
            Err(error) => {
                crate::metrics::PIPELINE_FAILURES_TOTAL
                    .with_label_values(&[error.kind()])
                    .inc();
                tracing::warn!(entry_point, kind = error.kind(), %error, "Invocation failed");
            }
        }

        result
    }

    async fn run_tweet(&self, request: &PostRequest) -> Result<Outcome, PipelineError> {
        let media = match request.image() {
            Some(image) => Some(
                self.upload_to_network(image, request.alt.as_deref().unwrap_or(""))
                    .await?,
            ),
            None => None,
        };

        let post = self.publish(&request.status, media, request.reply()).await?;

        // The tweet is live from here on; failures below are not rolled back.
        match self.record_tweet(request, &post).await {
            Ok(receipt) => Ok(Outcome {
                network: Network::Twitter,
                post_id: post.id,
                receipt,
            }),
            Err(error) => {
                tracing::error!(
                    published_post_id = %post.id,
                    kind = error.kind(),
                    %error,
                    "Tweet is published but was not recorded"
                );
                Err(error)
            }
        }
    }

    async fn record_tweet(
        &self,
        request: &PostRequest,
        post: &PublishedPost,
    ) -> Result<AppendReceipt, PipelineError> {
        if let (Some(archive), Some(image)) = (&self.archive, request.image()) {
            archive.archive(image, &post.id).await?;
        }

        let row = LedgerRow::for_tweet(post)?;
        Ok(self.ledger.append_row(&row).await?)
    }

    async fn run_instagram(&self, request: &PostRequest) -> Result<Outcome, PipelineError> {
        let instagram_id = request.instagram_id().ok_or_else(|| {
            PipelineError::InvalidRequest("instagram posts require instagram_id".to_string())
        })?;
        let image = request.image().ok_or_else(|| {
            PipelineError::InvalidRequest("instagram posts require an image".to_string())
        })?;

        let recorded = async {
            if let Some(archive) = &self.archive {
                archive.archive(image, instagram_id).await?;
            }
            let row = LedgerRow::for_instagram(instagram_id, &request.status, chrono::Utc::now());
            Ok::<_, PipelineError>(self.ledger.append_row(&row).await?)
        }
        .await;

        match recorded {
            Ok(receipt) => Ok(Outcome {
                network: Network::Instagram,
                post_id: instagram_id.to_string(),
                receipt,
            }),
            Err(error) => {
                tracing::error!(
                    instagram_id,
                    kind = error.kind(),
                    %error,
                    "Instagram post was not recorded"
                );
                Err(error)
            }
        }
    }

    /// Upload an image and attach its alt text
    async fn upload_to_network(&self, image: &str, alt_text: &str) -> Result<MediaRef, UploadError> {
        let media = self
            .network
            .upload_media(image)
            .await
            .map_err(UploadError::Upload)?;
        self.network
            .create_media_metadata(&media, alt_text)
            .await
            .map_err(UploadError::Metadata)?;

        tracing::debug!(media_id = media.as_str(), "Media uploaded");
        Ok(media)
    }

    async fn publish(
        &self,
        status: &str,
        media: Option<MediaRef>,
        reply_to: Option<&str>,
    ) -> Result<PublishedPost, PublishError> {
        let update = StatusUpdate {
            status: status.to_string(),
            media,
            in_reply_to: reply_to.map(str::to_string),
        };

        let post = self.network.post_status(&update).await.map_err(PublishError)?;

        crate::metrics::POSTS_PUBLISHED_TOTAL
            .with_label_values(&[self.network.name()])
            .inc();
        tracing::info!(post_id = %post.id, network = self.network.name(), "Status published");
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;
    use crate::error::LedgerError;
    use crate::ledger::EventLogLedger;
    use crate::social::{MockSocialNetwork, SocialCall};
    use crate::storage::{MemoryObjectStore, ObjectStore};

    fn media_config() -> MediaConfig {
        MediaConfig {
            bucket: "media".to_string(),
            key_prefix: "images/social/".to_string(),
            public_read: true,
        }
    }

    fn request(network: Network) -> PostRequest {
        PostRequest {
            network,
            status: "hello".to_string(),
            image: None,
            alt: None,
            reply: None,
            instagram_id: None,
        }
    }

    fn pipeline(
        variant: PipelineVariant,
        network: &MockSocialNetwork,
        store: &MemoryObjectStore,
    ) -> Pipeline {
        let store: Arc<dyn ObjectStore> = Arc::new(store.clone());
        let archive = Arc::new(MediaArchive::new(store.clone(), &media_config()));
        let ledger = Arc::new(EventLogLedger::new(store, "ledger", "events", "social"));
        Pipeline::new(variant, Arc::new(network.clone()), Some(archive), ledger)
    }

    #[test]
    fn request_treats_empty_strings_as_absent() {
        let request: PostRequest = serde_json::from_str(
            r#"{"network":"twitter","status":"hi","image":"","reply":null}"#,
        )
        .unwrap();
        assert_eq!(request.image(), None);
        assert_eq!(request.reply(), None);
    }

    #[test]
    fn unknown_network_is_rejected_at_deserialization() {
        let result: Result<PostRequest, _> =
            serde_json::from_str(r#"{"network":"myspace","status":"hi"}"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn image_tweet_uploads_with_alt_text_before_publishing() {
        let network = MockSocialNetwork::new();
        let store = MemoryObjectStore::new();
        let pipeline = pipeline(PipelineVariant::Social, &network, &store);

        let mut request = request(Network::Twitter);
        request.image = Some("aGVsbG8=".to_string());
        request.alt = Some("a greeting".to_string());
        let outcome = pipeline.run(&request).await.unwrap();

        let calls = network.calls();
        assert!(matches!(&calls[0], SocialCall::UploadMedia { media_data } if media_data == "aGVsbG8="));
        assert!(matches!(&calls[1], SocialCall::CreateMediaMetadata { alt_text, .. } if alt_text == "a greeting"));
        assert!(matches!(&calls[2], SocialCall::PostStatus(update) if update.media.is_some()));

        let archived = format!("images/social/{}", outcome.post_id);
        assert_eq!(store.object("media", &archived).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn missing_alt_text_is_sent_as_empty() {
        let network = MockSocialNetwork::new();
        let pipeline = pipeline(PipelineVariant::Social, &network, &MemoryObjectStore::new());

        let mut request = request(Network::Twitter);
        request.image = Some("aGVsbG8=".to_string());
        pipeline.run(&request).await.unwrap();

        assert!(matches!(
            &network.calls()[1],
            SocialCall::CreateMediaMetadata { alt_text, .. } if alt_text.is_empty()
        ));
    }

    #[tokio::test]
    async fn tweet_only_does_not_archive() {
        let network = MockSocialNetwork::new();
        let store = MemoryObjectStore::new();
        let pipeline = pipeline(PipelineVariant::TweetOnly, &network, &store);

        let mut request = request(Network::Twitter);
        request.image = Some("aGVsbG8=".to_string());
        pipeline.run(&request).await.unwrap();

        assert!(
            store
                .calls()
                .iter()
                .all(|call| !matches!(call, crate::storage::StoreCall::Put { bucket, .. } if bucket == "media"))
        );
    }

    #[tokio::test]
    async fn tweet_only_rejects_instagram() {
        let network = MockSocialNetwork::new();
        let store = MemoryObjectStore::new();
        let pipeline = pipeline(PipelineVariant::TweetOnly, &network, &store);

        let mut request = request(Network::Instagram);
        request.instagram_id = Some("abc123".to_string());
        request.image = Some("aGVsbG8=".to_string());
        let error = pipeline.run(&request).await.unwrap_err();

        assert_eq!(error.kind(), "invalid_request");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn instagram_without_id_has_no_side_effects() {
        let network = MockSocialNetwork::new();
        let store = MemoryObjectStore::new();
        let pipeline = pipeline(PipelineVariant::Social, &network, &store);

        let mut request = request(Network::Instagram);
        request.image = Some("aGVsbG8=".to_string());
        let error = pipeline.run(&request).await.unwrap_err();

        assert!(matches!(error, PipelineError::InvalidRequest(_)));
        assert!(store.calls().is_empty());
        assert!(network.calls().is_empty());
    }

    #[tokio::test]
    async fn metadata_failure_stops_before_publish() {
        let network = MockSocialNetwork::new().failing_metadata("bad alt");
        let store = MemoryObjectStore::new();
        let pipeline = pipeline(PipelineVariant::Social, &network, &store);

        let mut request = request(Network::Twitter);
        request.image = Some("aGVsbG8=".to_string());
        let error = pipeline.run(&request).await.unwrap_err();

        assert!(matches!(error, PipelineError::Upload(UploadError::Metadata(_))));
        assert!(network.posted().is_empty());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn archive_failure_skips_the_ledger() {
        let network = MockSocialNetwork::new();
        let store = MemoryObjectStore::new();
        let pipeline = pipeline(PipelineVariant::Social, &network, &store);

        let mut request = request(Network::Twitter);
        request.image = Some("not base64!".to_string());
        let error = pipeline.run(&request).await.unwrap_err();

        assert_eq!(error.kind(), "archive");
        assert!(error.after_publish());
        assert_eq!(network.posted().len(), 1);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn ledger_failure_is_tagged() {
        let network = MockSocialNetwork::new();
        let mut store = crate::storage::MockObjectStore::new();
        store.expect_put_object().returning(|bucket, key, _, _| {
            Err(crate::error::StorageError::request(bucket, key, "denied"))
        });
        let ledger = Arc::new(EventLogLedger::new(Arc::new(store), "ledger", "events", "social"));
        let pipeline = Pipeline::new(
            PipelineVariant::Social,
            Arc::new(network.clone()),
            None,
            ledger,
        );

        let error = pipeline.run(&request(Network::Twitter)).await.unwrap_err();

        assert!(matches!(error, PipelineError::Ledger(LedgerError::PersistFailed(_))));
        assert_eq!(error.kind(), "ledger_persist");
        assert_eq!(network.posted().len(), 1);
    }
}
