//! Socialpost - post to Twitter, record Instagram posts, keep a ledger
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - POST /post-to-social, POST /post-tweet-only              │
//! │  - Admin (ledger init / listing), metrics, health           │
//! │  - Bearer token on invocation and admin routes              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Pipeline: upload → publish → archive → ledger            │
//! │  - Reporter: result → 🚀 / ✨ / 🔥 "<detail>"                │
//! └─────────────────────────────────────────────────────────────┘
//!              │                                 │
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │  Social (Twitter, OAuth1) │   │  Ledger + Storage (S3)       │
//! │  - media upload           │   │  - SQLite snapshot object    │
//! │  - status update          │   │  - or event log objects      │
//! └──────────────────────────┘   │  - media archive             │
//!                                └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Pipeline and result reporter
//! - `social`: Social network client (Twitter) and its test double
//! - `ledger`: Post ledger (SQLite snapshot or event log)
//! - `storage`: Object storage (S3, in-memory) and media archive
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod service;
pub mod social;
pub mod storage;

use std::sync::{Arc, Mutex};

use service::{Pipeline, PipelineVariant};
use social::SocialNetwork;
use storage::{MediaArchive, ObjectStore};

/// Shared, ordered journal of calls made to test doubles
///
/// Handing the same journal to [`storage::MemoryObjectStore`] and
/// [`social::MockSocialNetwork`] records the interleaving of network and
/// storage calls.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// `post-to-social` pipeline
    pub social: Arc<Pipeline>,

    /// `post-tweet-only` pipeline
    pub tweets: Arc<Pipeline>,
}

impl AppState {
    /// Initialize application state against the configured services
    ///
    /// # Steps
    /// 1. Build the HTTP client and Twitter client
    /// 2. Connect to object storage
    /// 3. Assemble both pipelines
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. HTTP client shared by all network calls
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Socialpost/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;
        let network = Arc::new(social::TwitterClient::new(
            Arc::new(http_client),
            &config.twitter,
        ));

        // 2. Object storage
        let store = Arc::new(storage::S3ObjectStore::new(&config.storage));
        tracing::info!(
            region = %config.storage.region,
            endpoint = ?config.storage.endpoint,
            "Object storage initialized"
        );

        let state = Self::from_parts(config, network, store);
        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Assemble state from already-built collaborators
    ///
    /// Used by [`AppState::new`] and by tests, which pass in-memory doubles.
    pub fn from_parts(
        config: config::AppConfig,
        network: Arc<dyn SocialNetwork>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let ledger_config = &config.storage.ledger;
        let archive = Arc::new(MediaArchive::new(store.clone(), &config.storage.media));

        let social = Pipeline::new(
            PipelineVariant::Social,
            network.clone(),
            Some(archive),
            ledger::build_ledger(store.clone(), ledger_config, &ledger_config.social_table),
        );
        let tweets = Pipeline::new(
            PipelineVariant::TweetOnly,
            network,
            None,
            ledger::build_ledger(store, ledger_config, &ledger_config.tweet_table),
        );

        tracing::info!(
            mode = ?ledger_config.mode,
            write_mode = ?ledger_config.write_mode,
            bucket = %ledger_config.bucket,
            "Ledger configured"
        );
        if ledger_config.mode == config::LedgerMode::Snapshot
            && ledger_config.write_mode == config::WriteMode::Overwrite
        {
            tracing::warn!(
                "storage.ledger.write_mode=overwrite: concurrent invocations can silently drop ledger rows"
            );
        }

        Self {
            config: Arc::new(config),
            social: Arc::new(social),
            tweets: Arc::new(tweets),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::trace::TraceLayer;

    let protected = Router::new()
        .merge(api::invoke_router())
        .nest("/admin", api::admin_router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_token,
        ));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
