//! Object storage module
//!
//! Handles:
//! - The `ObjectStore` seam (get/put/list) shared by the ledger and the media archive
//! - S3 implementation (AWS or any S3-compatible endpoint)
//! - In-memory implementation used by tests and local runs
//! - Media archive (public images)

mod media;
mod memory;
mod s3;

pub use media::{ArchivedMedia, MediaArchive, content_type_for_key};
pub use memory::{MemoryObjectStore, StoreCall};
pub use s3::S3ObjectStore;

use async_trait::async_trait;

use crate::error::StorageError;

/// A fetched object together with its entity tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub etag: Option<String>,
}

/// Write condition attached to a put
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Precondition {
    /// Unconditional overwrite
    #[default]
    None,
    /// Only if the current object has this ETag
    IfMatch(String),
    /// Only if no object exists at the key
    IfNoneMatch,
}

/// Options for [`ObjectStore::put_object`]
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    /// Apply the public-read canned ACL
    pub public_read: bool,
    pub precondition: Precondition,
}

impl PutOptions {
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn public_read(mut self, public_read: bool) -> Self {
        self.public_read = public_read;
        self
    }

    pub fn precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }
}

/// Minimal object storage contract
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a whole object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError>;

    /// Store a whole object, returning the new ETag when the store reports one
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: PutOptions,
    ) -> Result<Option<String>, StorageError>;

    /// List keys under a prefix, in lexicographic order
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError>;
}

pub(crate) fn build_s3_http_client() -> aws_sdk_s3::config::SharedHttpClient {
    use aws_smithy_runtime::client::http::hyper_014::HyperClientBuilder;

    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .build();

    HyperClientBuilder::new().build(https_connector)
}
