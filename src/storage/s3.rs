//! S3 object store
//!
//! Works against AWS S3 or any S3-compatible endpoint (MinIO, R2).

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::SdkError;

use super::{ObjectStore, Precondition, PutOptions, StoredObject};
use crate::config::StorageConfig;
use crate::error::StorageError;

const HTTP_PRECONDITION_FAILED: u16 = 412;
const HTTP_NOT_FOUND: u16 = 404;

/// S3-backed [`ObjectStore`]
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    /// Create new S3 client
    ///
    /// # Arguments
    /// * `config` - Storage configuration (region, endpoint, credentials)
    pub fn new(config: &StorageConfig) -> Self {
        use aws_sdk_s3::config::BehaviorVersion;
        use aws_sdk_s3::config::{Credentials, Region};

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            config.session_token.clone(),
            None,
            "socialpost-s3",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .http_client(super::build_s3_http_client())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            // Custom endpoints (MinIO, localstack) rarely support virtual-hosted buckets.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
        }
    }
}

fn status_of<E>(error: &SdkError<E, aws_sdk_s3::config::http::HttpResponse>) -> Option<u16> {
    error.raw_response().map(|response| response.status().as_u16())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .map(|service| service.is_no_such_key())
                    .unwrap_or(false)
                    || status_of(&e) == Some(HTTP_NOT_FOUND);
                if not_found {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::request(bucket, key, aws_sdk_s3::error::DisplayErrorContext(&e))
                }
            })?;

        let etag = result.e_tag.clone();
        let data = result
            .body
            .collect()
            .await
            .map_err(|e| StorageError::request(bucket, key, format!("reading body: {}", e)))?;

        Ok(StoredObject {
            body: data.into_bytes().to_vec(),
            etag,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: PutOptions,
    ) -> Result<Option<String>, StorageError> {
        use aws_sdk_s3::primitives::ByteStream;
        use aws_sdk_s3::types::ObjectCannedAcl;

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body));

        if let Some(content_type) = &options.content_type {
            request = request.content_type(content_type);
        }
        if options.public_read {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }
        request = match &options.precondition {
            Precondition::None => request,
            Precondition::IfMatch(etag) => request.if_match(etag),
            Precondition::IfNoneMatch => request.if_none_match("*"),
        };

        let output = request.send().await.map_err(|e| {
            if status_of(&e) == Some(HTTP_PRECONDITION_FAILED) {
                StorageError::PreconditionFailed {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StorageError::request(bucket, key, aws_sdk_s3::error::DisplayErrorContext(&e))
            }
        })?;

        Ok(output.e_tag)
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let result = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    StorageError::request(bucket, prefix, aws_sdk_s3::error::DisplayErrorContext(&e))
                })?;

            if let Some(contents) = result.contents {
                keys.extend(contents.into_iter().filter_map(|object| object.key));
            }

            match result.next_continuation_token {
                Some(token) if result.is_truncated.unwrap_or(false) => continuation = Some(token),
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }
}
