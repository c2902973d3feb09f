//! API layer
//!
//! HTTP handlers for:
//! - Invocation entry points (post-to-social, post-tweet-only)
//! - Admin API (ledger maintenance)
//! - Bearer token middleware guarding both
//! - Metrics (Prometheus)

mod admin;
mod auth;
mod invoke;
pub mod metrics;

pub use admin::admin_router;
pub use auth::require_token;
pub use invoke::{ERROR_KIND_HEADER, invoke_router};
pub use metrics::metrics_router;
