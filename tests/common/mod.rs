//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use socialpost::config::{
    AppConfig, LedgerConfig, LedgerMode, LoggingConfig, MediaConfig, ServerConfig, StorageConfig,
    TwitterConfig, WriteMode,
};
use socialpost::ledger::{Ledger, LedgerRow, SnapshotLedger};
use socialpost::social::MockSocialNetwork;
use socialpost::storage::MemoryObjectStore;
use socialpost::{AppState, CallLog};
use tokio::net::TcpListener;

pub const LEDGER_BUCKET: &str = "test-ledger";
pub const LEDGER_FILE: &str = "social.db";
pub const MEDIA_BUCKET: &str = "test-media";
pub const INVOKE_TOKEN: &str = "test-invoke-token";

static METRICS: Once = Once::new();

/// Test configuration pointing at in-memory doubles
pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            invoke_token: INVOKE_TOKEN.to_string(),
        },
        twitter: TwitterConfig {
            consumer_key: "test-consumer-key".to_string(),
            consumer_secret: "test-consumer-secret".to_string(),
            access_token: "test-access-token".to_string(),
            access_token_secret: "test-access-token-secret".to_string(),
            api_base_url: "https://api.twitter.test".to_string(),
            upload_base_url: "https://upload.twitter.test".to_string(),
        },
        storage: StorageConfig {
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: "test-key".to_string(),
            secret_access_key: "test-secret".to_string(),
            session_token: None,
            ledger: LedgerConfig {
                bucket: LEDGER_BUCKET.to_string(),
                filename: LEDGER_FILE.to_string(),
                mode: LedgerMode::Snapshot,
                write_mode: WriteMode::Conditional,
                social_table: "social".to_string(),
                tweet_table: "tweets".to_string(),
                event_prefix: "ledger/events".to_string(),
            },
            media: MediaConfig {
                bucket: MEDIA_BUCKET.to_string(),
                key_prefix: "images/social/".to_string(),
                public_read: true,
            },
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Bytes of a ledger snapshot holding the given (empty) tables
pub async fn ledger_snapshot(tables: &[&str]) -> Vec<u8> {
    let scratch_store = MemoryObjectStore::new();
    for table in tables {
        SnapshotLedger::new(
            Arc::new(scratch_store.clone()),
            LEDGER_BUCKET,
            LEDGER_FILE,
            table,
            WriteMode::Conditional,
        )
        .initialize()
        .await
        .unwrap();
    }
    scratch_store.object(LEDGER_BUCKET, LEDGER_FILE).unwrap()
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub store: MemoryObjectStore,
    pub network: MockSocialNetwork,
    pub journal: CallLog,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Server with a seeded snapshot ledger and a network that accepts everything
    pub async fn new() -> Self {
        let server = Self::with(test_config(), MockSocialNetwork::new()).await;
        server.seed_ledger().await;
        server
    }

    /// Server with custom configuration and network; nothing is seeded
    pub async fn with(config: AppConfig, network: MockSocialNetwork) -> Self {
        METRICS.call_once(socialpost::metrics::init_metrics);

        let journal: CallLog = Arc::new(Mutex::new(Vec::new()));
        let store = MemoryObjectStore::new().with_journal(journal.clone());
        let network = network.with_journal(journal.clone());

        let state = AppState::from_parts(config, Arc::new(network.clone()), Arc::new(store.clone()));

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = socialpost::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
            store,
            network,
            journal,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Put an empty ledger with both tables in place, bypassing the journal
    pub async fn seed_ledger(&self) {
        let body = ledger_snapshot(&["social", "tweets"]).await;
        self.store.insert(LEDGER_BUCKET, LEDGER_FILE, body);
    }

    /// POST request carrying the invoke token
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(INVOKE_TOKEN)
    }

    /// GET request carrying the invoke token
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(INVOKE_TOKEN)
    }

    /// POST a JSON invocation body
    pub async fn invoke(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.post(path).json(&body).send().await.unwrap()
    }

    /// Snapshot of the shared call journal
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    /// Rows of the post-to-social ledger
    pub async fn social_rows(&self) -> Vec<LedgerRow> {
        self.state.social.ledger().rows().await.unwrap()
    }

    /// Rows of the post-tweet-only ledger
    pub async fn tweet_rows(&self) -> Vec<LedgerRow> {
        self.state.tweets.ledger().rows().await.unwrap()
    }
}
