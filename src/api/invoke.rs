//! Invocation endpoints
//!
//! Each route runs one pipeline over the JSON body and answers with the
//! reporter's text: the success token, or `🔥 "<detail>"` on failure.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use std::sync::Arc;

use crate::AppState;
use crate::error::{AppError, PipelineError};
use crate::service::{Pipeline, PostRequest, Report, report};

/// Header carrying [`PipelineError::kind`] on failed invocations
pub const ERROR_KIND_HEADER: &str = "x-error-kind";

/// Create invocation router
///
/// Routes:
/// - POST /post-to-social
/// - POST /post-tweet-only
pub fn invoke_router() -> Router<AppState> {
    Router::new()
        .route("/post-to-social", post(post_to_social))
        .route("/post-tweet-only", post(post_tweet_only))
}

async fn post_to_social(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    invoke(&state.social, &body).await
}

async fn post_tweet_only(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    invoke(&state.tweets, &body).await
}

async fn invoke(pipeline: &Arc<Pipeline>, body: &[u8]) -> Result<Response, AppError> {
    // Unknown networks fail here, before any side effect.
    let request: PostRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("invalid invocation body: {}", e)))?;

    let result = pipeline.run(&request).await;
    let report = report(&result);
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(PipelineError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
        Err(_) => StatusCode::BAD_GATEWAY,
    };

    let mut response = (status, report.to_string()).into_response();
    if let Report::Failure { kind, .. } = report {
        crate::metrics::ERRORS_TOTAL.with_label_values(&[kind]).inc();
        response
            .headers_mut()
            .insert(ERROR_KIND_HEADER, HeaderValue::from_static(kind));
    }

    Ok(response)
}
