//! Bearer token check
//!
//! Guards the invocation and admin routes. Health and metrics stay open.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::AppError;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Byte comparison that does not stop at the first mismatch
fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.len() == expected.len()
        && presented
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Middleware requiring `Authorization: Bearer <server.invoke_token>`
///
/// # Usage
/// ```ignore
/// let protected = Router::new()
///     .merge(invoke_router())
///     .route_layer(middleware::from_fn_with_state(state, require_token));
/// ```
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let authorized = bearer_token(request.headers())
        .is_some_and(|token| tokens_match(token, &state.config.server.invoke_token));

    if !authorized {
        tracing::warn!(path = %request.uri().path(), "Rejected request without a valid token");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
