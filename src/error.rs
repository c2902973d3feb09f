//! Error types for Socialpost
//!
//! Each pipeline step has its own error type. They are carried as the tagged
//! [`PipelineError`] up to the reporter, which is the only place an error is
//! flattened into a string. `AppError` covers everything outside a single
//! invocation (startup, configuration, HTTP plumbing).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or wrong bearer token (401)
    #[error("Unauthorized")]
    Unauthorized,

    /// Pipeline step failed (502)
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Object storage error (500)
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Ledger error (500)
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Maps each error variant to a status code and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized".to_string(),
                "unauthorized",
            ),
            AppError::Pipeline(err) => (StatusCode::BAD_GATEWAY, self.to_string(), err.kind()),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string(), "storage"),
            AppError::Ledger(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string(), "ledger"),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string(), "http_client"),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// =============================================================================
// Object storage
// =============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("object s3://{bucket}/{key} does not exist")]
    NotFound { bucket: String, key: String },

    #[error("precondition failed for s3://{bucket}/{key}")]
    PreconditionFailed { bucket: String, key: String },

    #[error("request to s3://{bucket}/{key} failed: {message}")]
    Request {
        bucket: String,
        key: String,
        message: String,
    },
}

impl StorageError {
    pub fn request(bucket: &str, key: &str, message: impl std::fmt::Display) -> Self {
        StorageError::Request {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

// =============================================================================
// Social network
// =============================================================================

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("network rejected request with HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("request signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("media upload failed: {0}")]
    Upload(#[source] SocialError),

    #[error("media metadata creation failed: {0}")]
    Metadata(#[source] SocialError),
}

#[derive(Debug, Error)]
#[error("status update failed: {0}")]
pub struct PublishError(#[source] pub SocialError);

// =============================================================================
// Media archive
// =============================================================================

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("image is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("media archive write failed: {0}")]
    Storage(#[source] StorageError),
}

// =============================================================================
// Ledger
// =============================================================================

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Snapshot could not be fetched; nothing was inserted or persisted.
    #[error("ledger fetch failed: {0}")]
    FetchFailed(#[source] StorageError),

    /// The local insert failed; the remote snapshot is untouched.
    #[error("ledger insert failed: {0}")]
    InsertFailed(String),

    /// The row exists locally but the shared ledger does not reflect it.
    #[error("ledger persist failed: {0}")]
    PersistFailed(#[source] StorageError),

    /// Another writer replaced the snapshot between fetch and persist.
    #[error("ledger snapshot s3://{bucket}/{key} changed since it was fetched")]
    Conflict { bucket: String, key: String },

    /// Existing rows could not be read back.
    #[error("ledger read failed: {0}")]
    Read(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::InsertFailed(err.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::InsertFailed(format!("scratch file: {}", err))
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Terminal failure of one invocation, tagged by the step that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl PipelineError {
    /// Stable, machine-readable name of the failing step
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::Upload(_) => "upload",
            PipelineError::Publish(_) => "publish",
            PipelineError::Archive(_) => "archive",
            PipelineError::Ledger(LedgerError::FetchFailed(_)) => "ledger_fetch",
            PipelineError::Ledger(LedgerError::InsertFailed(_)) => "ledger_insert",
            PipelineError::Ledger(LedgerError::PersistFailed(_)) => "ledger_persist",
            PipelineError::Ledger(LedgerError::Conflict { .. }) => "ledger_conflict",
            PipelineError::Ledger(LedgerError::Read(_)) => "ledger_read",
        }
    }

    /// Whether the post may already be live on the network when this error surfaced
    pub fn after_publish(&self) -> bool {
        matches!(self, PipelineError::Archive(_) | PipelineError::Ledger(_))
    }
}
