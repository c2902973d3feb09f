//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub twitter: TwitterConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Bearer token required on invocation and admin routes
    pub invoke_token: String,
}

/// Twitter API credentials and endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
    /// Base URL for status endpoints (default: "https://api.twitter.com")
    pub api_base_url: String,
    /// Base URL for media endpoints (default: "https://upload.twitter.com")
    pub upload_base_url: String,
}

/// Object storage configuration (S3 or S3-compatible)
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Region (default: "us-east-1")
    pub region: String,
    /// Custom endpoint for S3-compatible services; AWS when unset
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub ledger: LedgerConfig,
    pub media: MediaConfig,
}

/// Where and how the post ledger is kept
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Bucket holding the ledger
    pub bucket: String,
    /// Object key of the SQLite snapshot (also the scratch file name)
    pub filename: String,
    #[serde(default)]
    pub mode: LedgerMode,
    #[serde(default)]
    pub write_mode: WriteMode,
    /// Table used by the post-to-social entry point
    pub social_table: String,
    /// Table used by the post-tweet-only entry point
    pub tweet_table: String,
    /// Key prefix for event-log records
    pub event_prefix: String,
}

/// Ledger layout
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedgerMode {
    /// One SQLite file, fetched and rewritten on every append
    #[default]
    Snapshot,
    /// One immutable object per appended row
    EventLog,
}

/// How a snapshot is written back
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Put only if the snapshot still has the fetched ETag
    #[default]
    Conditional,
    /// Unconditional put; last writer wins
    Overwrite,
}

/// Media archive configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Bucket receiving archived images
    pub bucket: String,
    /// Prefix prepended to every archived key (default: "images/social/")
    pub key_prefix: String,
    /// Store archived images with a public-read ACL
    pub public_read: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SOCIALPOST__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("twitter.api_base_url", "https://api.twitter.com")?
            .set_default("twitter.upload_base_url", "https://upload.twitter.com")?
            .set_default("storage.region", "us-east-1")?
            .set_default("storage.ledger.mode", "snapshot")?
            .set_default("storage.ledger.write_mode", "conditional")?
            .set_default("storage.ledger.social_table", "social")?
            .set_default("storage.ledger.tweet_table", "tweets")?
            .set_default("storage.ledger.event_prefix", "ledger/events")?
            .set_default("storage.media.key_prefix", "images/social/")?
            .set_default("storage.media.public_read", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SOCIALPOST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        let required = [
            ("storage.ledger.bucket", &self.storage.ledger.bucket),
            ("storage.ledger.filename", &self.storage.ledger.filename),
            ("storage.media.bucket", &self.storage.media.bucket),
            ("server.invoke_token", &self.server.invoke_token),
            ("twitter.consumer_key", &self.twitter.consumer_key),
            ("twitter.consumer_secret", &self.twitter.consumer_secret),
            ("twitter.access_token", &self.twitter.access_token),
            ("twitter.access_token_secret", &self.twitter.access_token_secret),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{} must not be empty", name)));
            }
        }

        // Scratch files are named after the ledger filename.
        let filename = self.storage.ledger.filename.trim();
        if filename.contains('/') || filename == "." || filename == ".." {
            return Err(AppError::Config(
                "storage.ledger.filename must be a plain file name".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "logging.level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        for (name, table) in [
            ("storage.ledger.social_table", &self.storage.ledger.social_table),
            ("storage.ledger.tweet_table", &self.storage.ledger.tweet_table),
        ] {
            if !is_sql_identifier(table) {
                return Err(AppError::Config(format!(
                    "{} must be a plain SQL identifier, got {:?}",
                    name, table
                )));
            }
        }

        for (name, base) in [
            ("twitter.api_base_url", &self.twitter.api_base_url),
            ("twitter.upload_base_url", &self.twitter.upload_base_url),
        ] {
            url::Url::parse(base)
                .map_err(|e| AppError::Config(format!("{} is not a valid URL: {}", name, e)))?;
        }

        if let Some(endpoint) = &self.storage.endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                AppError::Config(format!("storage.endpoint is not a valid URL: {}", e))
            })?;
        }

        Ok(())
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Table names are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` is accepted.
pub(crate) fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
