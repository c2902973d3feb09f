//! Post ledger
//!
//! An append-only record of every post. Two layouts are supported:
//!
//! - [`SnapshotLedger`]: one SQLite file stored as a single object. Every
//!   append fetches it, inserts one row into a scratch copy and writes it
//!   back. Concurrent appends race on that object; see [`WriteMode`].
//! - [`EventLogLedger`]: one immutable JSON object per row. Appends never
//!   read, so they never race.
//!
//! # Hazard
//!
//! The ledger is written after the post is live on the network. If the
//! append fails the post stays published and the ledger does not mention it.
//! This is reported (error kind, logs, metrics) but never compensated.
//!
//! [`WriteMode`]: crate::config::WriteMode

mod event_log;
mod snapshot;

pub use event_log::EventLogLedger;
pub use snapshot::{SnapshotLedger, empty_snapshot};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{LedgerConfig, LedgerMode};
use crate::error::LedgerError;
use crate::social::PublishedPost;
use crate::storage::ObjectStore;

/// `YYYY-MM-DD H:mm:ss Z`, e.g. "2018-10-10 20:19:24 +00:00"
const LEDGER_DATE_FORMAT: &str = "%Y-%m-%d %-H:%M:%S %:z";

/// Fixed column list; inserts bind values in exactly this order.
pub const LEDGER_COLUMNS: [&str; 7] = [
    "date",
    "post",
    "twitter",
    "instagram",
    "tweet_urls",
    "tweet_id",
    "instagram_id",
];

/// Format a timestamp the way ledger rows store it
pub fn format_ledger_date<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    at.format(LEDGER_DATE_FORMAT).to_string()
}

/// One ledger row
///
/// Only constructible through [`LedgerRow::for_tweet`] and
/// [`LedgerRow::for_instagram`], so exactly one network flag is set and
/// `tweet_id` is present iff the row is a tweet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerRow {
    date: String,
    post: String,
    twitter: i64,
    instagram: i64,
    tweet_urls: String,
    tweet_id: Option<i64>,
    instagram_id: String,
}

impl LedgerRow {
    /// Row for a published tweet
    ///
    /// # Errors
    /// `InsertFailed` when the tweet id is not numeric.
    pub fn for_tweet(post: &PublishedPost) -> Result<Self, LedgerError> {
        let tweet_id = post.id.parse::<i64>().map_err(|_| {
            LedgerError::InsertFailed(format!("tweet id {:?} is not an integer", post.id))
        })?;
        let tweet_urls = serde_json::to_string(&post.entity_urls)
            .map_err(|e| LedgerError::InsertFailed(format!("encoding tweet urls: {}", e)))?;

        Ok(Self {
            date: format_ledger_date(&post.created_at),
            post: post.text.clone(),
            twitter: 1,
            instagram: 0,
            tweet_urls,
            tweet_id: Some(tweet_id),
            instagram_id: String::new(),
        })
    }

    /// Row for an Instagram post recorded at `at`
    pub fn for_instagram(instagram_id: &str, text: &str, at: DateTime<Utc>) -> Self {
        Self {
            date: format_ledger_date(&at),
            post: text.to_string(),
            twitter: 0,
            instagram: 1,
            tweet_urls: String::new(),
            tweet_id: None,
            instagram_id: instagram_id.to_string(),
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn post(&self) -> &str {
        &self.post
    }

    pub fn is_twitter(&self) -> bool {
        self.twitter == 1
    }

    pub fn is_instagram(&self) -> bool {
        self.instagram == 1
    }

    pub fn tweet_urls(&self) -> &str {
        &self.tweet_urls
    }

    pub fn tweet_id(&self) -> Option<i64> {
        self.tweet_id
    }

    pub fn instagram_id(&self) -> &str {
        &self.instagram_id
    }

    /// Raw 0/1 flags as stored
    pub fn flags(&self) -> (i64, i64) {
        (self.twitter, self.instagram)
    }
}

/// Result of a successful append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    /// Object the row now lives in
    pub key: String,
    /// SQLite rowid for snapshot ledgers
    pub rowid: Option<i64>,
    /// ETag of the written object, when the store reports one
    pub etag: Option<String>,
    /// Bytes written
    pub size: usize,
}

/// Result of [`Ledger::initialize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// A new, empty ledger was created
    Created,
    /// The ledger existed but lacked this table; the table was added
    TableAdded,
    /// Nothing to do
    AlreadyInitialized,
}

/// Append-only post ledger
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Record one row
    async fn append_row(&self, row: &LedgerRow) -> Result<AppendReceipt, LedgerError>;

    /// All rows in insertion order
    async fn rows(&self) -> Result<Vec<LedgerRow>, LedgerError>;

    /// Create the ledger if it does not exist yet
    async fn initialize(&self) -> Result<InitOutcome, LedgerError>;
}

/// Build the ledger for one table according to configuration
pub fn build_ledger(
    store: Arc<dyn ObjectStore>,
    config: &LedgerConfig,
    table: &str,
) -> Arc<dyn Ledger> {
    match config.mode {
        LedgerMode::Snapshot => Arc::new(SnapshotLedger::new(
            store,
            &config.bucket,
            &config.filename,
            table,
            config.write_mode,
        )),
        LedgerMode::EventLog => Arc::new(EventLogLedger::new(
            store,
            &config.bucket,
            &config.event_prefix,
            table,
        )),
    }
}
