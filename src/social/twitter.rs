//! Twitter REST v1.1 client
//!
//! Endpoints:
//! - `POST {upload}/1.1/media/upload.json` (form: `media_data`)
//! - `POST {upload}/1.1/media/metadata/create.json` (JSON body)
//! - `POST {api}/1.1/statuses/update.json` (form: `status`, `media_ids`, `in_reply_to_status_id`)

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::sync::Arc;

use super::oauth::{OAuthCredentials, authorization_header};
use super::{MediaRef, PublishedPost, SocialNetwork, StatusUpdate, UrlEntity};
use crate::config::TwitterConfig;
use crate::error::SocialError;

/// `created_at` layout, e.g. "Wed Oct 10 20:19:24 +0000 2018"
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    id_str: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    full_text: Option<String>,
    created_at: String,
    #[serde(default)]
    entities: TweetEntities,
}

#[derive(Debug, Default, Deserialize)]
struct TweetEntities {
    #[serde(default)]
    urls: Vec<UrlEntity>,
}

/// Parse Twitter's `created_at` timestamp
pub fn parse_created_at(value: &str) -> Result<DateTime<FixedOffset>, SocialError> {
    DateTime::parse_from_str(value, CREATED_AT_FORMAT)
        .map_err(|e| SocialError::Decode(format!("created_at {:?}: {}", value, e)))
}

impl TweetResponse {
    fn into_published(self, media_id: Option<String>) -> Result<PublishedPost, SocialError> {
        let created_at = parse_created_at(&self.created_at)?;
        Ok(PublishedPost {
            id: self.id_str,
            text: self.full_text.or(self.text).unwrap_or_default(),
            created_at,
            entity_urls: self.entities.urls,
            media_id,
        })
    }
}

/// Twitter client signing every request with OAuth 1.0a
pub struct TwitterClient {
    http_client: Arc<reqwest::Client>,
    credentials: OAuthCredentials,
    api_base_url: String,
    upload_base_url: String,
}

impl TwitterClient {
    pub fn new(http_client: Arc<reqwest::Client>, config: &TwitterConfig) -> Self {
        Self {
            http_client,
            credentials: OAuthCredentials {
                consumer_key: config.consumer_key.clone(),
                consumer_secret: config.consumer_secret.clone(),
                token: config.access_token.clone(),
                token_secret: config.access_token_secret.clone(),
            },
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            upload_base_url: config.upload_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POST a signed form and return the response body
    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<String, SocialError> {
        let authorization = authorization_header(&self.credentials, "POST", url, params)?;

        let response = self
            .http_client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .form(params)
            .send()
            .await?;

        read_body(response).await
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, SocialError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(SocialError::Api {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

#[async_trait]
impl SocialNetwork for TwitterClient {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn upload_media(&self, media_data: &str) -> Result<MediaRef, SocialError> {
        let url = format!("{}/1.1/media/upload.json", self.upload_base_url);
        let body = self.post_form(&url, &[("media_data", media_data)]).await?;

        let upload: MediaUploadResponse = serde_json::from_str(&body)
            .map_err(|e| SocialError::Decode(format!("media upload response: {}", e)))?;

        tracing::debug!(media_id = %upload.media_id_string, "Media uploaded");
        Ok(MediaRef(upload.media_id_string))
    }

    async fn create_media_metadata(
        &self,
        media: &MediaRef,
        alt_text: &str,
    ) -> Result<(), SocialError> {
        let url = format!("{}/1.1/media/metadata/create.json", self.upload_base_url);
        // JSON bodies are not part of the OAuth signature.
        let authorization = authorization_header(&self.credentials, "POST", &url, &[])?;

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&serde_json::json!({
                "media_id": media.as_str(),
                "alt_text": { "text": alt_text },
            }))
            .send()
            .await?;

        read_body(response).await?;
        Ok(())
    }

    async fn post_status(&self, update: &StatusUpdate) -> Result<PublishedPost, SocialError> {
        let url = format!("{}/1.1/statuses/update.json", self.api_base_url);

        let mut params = vec![
            ("status", update.status.as_str()),
            ("media_ids", update.media_ids()),
        ];
        if let Some(reply) = &update.in_reply_to {
            params.push(("in_reply_to_status_id", reply.as_str()));
        }

        let body = self.post_form(&url, &params).await?;
        let tweet: TweetResponse = serde_json::from_str(&body)
            .map_err(|e| SocialError::Decode(format!("status response: {}", e)))?;

        tweet.into_published(update.media.as_ref().map(|m| m.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_created_at_keeps_offset() {
        let parsed = parse_created_at("Wed Oct 10 20:19:24 +0000 2018").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2018-10-10T20:19:24+00:00");
    }

    #[test]
    fn parse_created_at_rejects_iso_dates() {
        assert!(parse_created_at("2018-10-10T20:19:24Z").is_err());
    }

    #[test]
    fn tweet_response_prefers_full_text() {
        let raw = r#"{
            "id_str": "1050118621198921728",
            "text": "truncated…",
            "full_text": "the whole status",
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "entities": {"urls": []}
        }"#;
        let tweet: TweetResponse = serde_json::from_str(raw).unwrap();
        let post = tweet.into_published(None).unwrap();

        assert_eq!(post.id, "1050118621198921728");
        assert_eq!(post.text, "the whole status");
        assert!(post.entity_urls.is_empty());
    }
}
