//! SQLite snapshot ledger
//!
//! The authoritative ledger is a SQLite file stored as one object. Every
//! append runs fetch → materialize → insert → persist, with the file
//! materialized in a per-call scratch directory that is removed on every
//! exit path.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, SqliteConnection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;

use super::{AppendReceipt, InitOutcome, LEDGER_COLUMNS, Ledger, LedgerRow};
use crate::config::WriteMode;
use crate::error::{LedgerError, StorageError};
use crate::storage::{ObjectStore, Precondition, PutOptions};

const SNAPSHOT_CONTENT_TYPE: &str = "application/x-sqlite3";

/// Snapshot ledger for one table
pub struct SnapshotLedger {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    table: String,
    write_mode: WriteMode,
    /// Parent directory for scratch copies (system temp dir when unset)
    scratch_root: Option<PathBuf>,
}

/// A snapshot materialized on local disk
///
/// The directory (and the file in it) is deleted when this is dropped.
struct Scratch {
    _dir: TempDir,
    path: PathBuf,
}

impl Scratch {
    fn create(root: Option<&Path>, filename: &str) -> Result<Self, std::io::Error> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("socialpost-ledger-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let path = dir.path().join(filename);
        Ok(Self { _dir: dir, path })
    }

    async fn materialize(
        root: Option<&Path>,
        filename: &str,
        body: &[u8],
    ) -> Result<Self, std::io::Error> {
        let scratch = Self::create(root, filename)?;
        tokio::fs::write(&scratch.path, body).await?;
        Ok(scratch)
    }

    async fn connect(&self, create: bool) -> Result<SqliteConnection, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(create)
            // Rollback journal: once closed, the main file holds every change.
            .journal_mode(SqliteJournalMode::Delete);
        SqliteConnection::connect_with(&options).await
    }

    async fn read(&self) -> Result<Vec<u8>, std::io::Error> {
        tokio::fs::read(&self.path).await
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (date TEXT, post TEXT, twitter INTEGER, instagram INTEGER, tweet_urls TEXT, tweet_id INTEGER, instagram_id TEXT)",
        table
    )
}

/// Bytes of a fresh SQLite file containing only the ledger table
pub async fn empty_snapshot(table: &str) -> Result<Vec<u8>, LedgerError> {
    let scratch = Scratch::create(None, "empty.db")?;
    let mut connection = scratch.connect(true).await?;
    sqlx::query(&create_table_sql(table))
        .execute(&mut connection)
        .await?;
    connection.close().await?;
    Ok(scratch.read().await?)
}

impl SnapshotLedger {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        key: &str,
        table: &str,
        write_mode: WriteMode,
    ) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            key: key.to_string(),
            table: table.to_string(),
            write_mode,
            scratch_root: None,
        }
    }

    /// Materialize snapshots under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    fn scratch_filename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    async fn materialize(&self, body: &[u8]) -> Result<Scratch, LedgerError> {
        Ok(Scratch::materialize(self.scratch_root.as_deref(), self.scratch_filename(), body).await?)
    }

    async fn insert(&self, scratch: &Scratch, row: &LedgerRow) -> Result<i64, LedgerError> {
        let sql = format!(
            "INSERT INTO {} VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.table
        );

        let mut connection = scratch.connect(false).await?;
        let result = sqlx::query(&sql)
            .bind(row.date())
            .bind(row.post())
            .bind(row.twitter)
            .bind(row.instagram)
            .bind(row.tweet_urls())
            .bind(row.tweet_id())
            .bind(row.instagram_id())
            .execute(&mut connection)
            .await?;
        connection.close().await?;

        Ok(result.last_insert_rowid())
    }

    async fn persist(
        &self,
        body: Vec<u8>,
        precondition: Precondition,
    ) -> Result<Option<String>, LedgerError> {
        self.store
            .put_object(
                &self.bucket,
                &self.key,
                body,
                PutOptions::default()
                    .content_type(SNAPSHOT_CONTENT_TYPE)
                    .precondition(precondition),
            )
            .await
            .map_err(|error| match error {
                StorageError::PreconditionFailed { bucket, key } => {
                    LedgerError::Conflict { bucket, key }
                }
                other => LedgerError::PersistFailed(other),
            })
    }

    fn write_precondition(&self, etag: Option<String>) -> Precondition {
        match (self.write_mode, etag) {
            (WriteMode::Overwrite, _) => Precondition::None,
            (WriteMode::Conditional, Some(etag)) => Precondition::IfMatch(etag),
            (WriteMode::Conditional, None) => {
                tracing::warn!(
                    bucket = %self.bucket,
                    key = %self.key,
                    "Store returned no ETag; persisting snapshot unconditionally"
                );
                Precondition::None
            }
        }
    }

    async fn append_inner(&self, row: &LedgerRow) -> Result<AppendReceipt, LedgerError> {
        // 1. Fetch
        let snapshot = self
            .store
            .get_object(&self.bucket, &self.key)
            .await
            .map_err(LedgerError::FetchFailed)?;
        tracing::debug!(size = snapshot.body.len(), etag = ?snapshot.etag, "Ledger snapshot fetched");

        // 2. Materialize
        let scratch = self.materialize(&snapshot.body).await?;

        // 3. Insert
        let rowid = self.insert(&scratch, row).await?;

        // 4. Persist
        let body = scratch.read().await?;
        let size = body.len();
        let precondition = self.write_precondition(snapshot.etag);
        let etag = self.persist(body, precondition).await?;

        crate::metrics::LEDGER_SNAPSHOT_BYTES.set(size as i64);

        Ok(AppendReceipt {
            key: self.key.clone(),
            rowid: Some(rowid),
            etag,
            size,
        })
    }
}

#[async_trait]
impl Ledger for SnapshotLedger {
    async fn append_row(&self, row: &LedgerRow) -> Result<AppendReceipt, LedgerError> {
        let started = Instant::now();
        let result = self.append_inner(row).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(LedgerError::FetchFailed(_)) => "fetch_failed",
            Err(LedgerError::InsertFailed(_)) => "insert_failed",
            Err(LedgerError::PersistFailed(_)) => "persist_failed",
            Err(LedgerError::Conflict { .. }) => "conflict",
            Err(LedgerError::Read(_)) => "read_failed",
        };
        crate::metrics::LEDGER_APPENDS_TOTAL
            .with_label_values(&[outcome])
            .inc();

        match &result {
            Ok(receipt) => tracing::info!(
                bucket = %self.bucket,
                key = %self.key,
                table = %self.table,
                rowid = ?receipt.rowid,
                size = receipt.size,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Ledger row appended"
            ),
            Err(error) => tracing::warn!(
                bucket = %self.bucket,
                key = %self.key,
                table = %self.table,
                %error,
                "Ledger append failed"
            ),
        }

        result
    }

    async fn rows(&self) -> Result<Vec<LedgerRow>, LedgerError> {
        let snapshot = self
            .store
            .get_object(&self.bucket, &self.key)
            .await
            .map_err(LedgerError::FetchFailed)?;
        let scratch = self.materialize(&snapshot.body).await?;

        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            LEDGER_COLUMNS.join(", "),
            self.table
        );
        let mut connection = scratch
            .connect(false)
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?;
        let rows = sqlx::query_as::<_, LedgerRow>(&sql)
            .fetch_all(&mut connection)
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?;
        connection
            .close()
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?;

        Ok(rows)
    }

    async fn initialize(&self) -> Result<InitOutcome, LedgerError> {
        let existing = match self.store.get_object(&self.bucket, &self.key).await {
            Ok(existing) => existing,
            Err(StorageError::NotFound { .. }) => {
                let body = empty_snapshot(&self.table).await?;
                self.persist(body, Precondition::IfNoneMatch).await?;
                tracing::info!(bucket = %self.bucket, key = %self.key, table = %self.table, "Ledger created");
                return Ok(InitOutcome::Created);
            }
            Err(error) => return Err(LedgerError::FetchFailed(error)),
        };

        let scratch = self.materialize(&existing.body).await?;
        let mut connection = scratch.connect(false).await?;
        let present: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(&self.table)
                .fetch_optional(&mut connection)
                .await?;
        if present.is_some() {
            connection.close().await?;
            return Ok(InitOutcome::AlreadyInitialized);
        }

        sqlx::query(&create_table_sql(&self.table))
            .execute(&mut connection)
            .await?;
        connection.close().await?;

        let body = scratch.read().await?;
        let precondition = match existing.etag {
            Some(etag) => Precondition::IfMatch(etag),
            None => Precondition::None,
        };
        self.persist(body, precondition).await?;
        tracing::info!(bucket = %self.bucket, key = %self.key, table = %self.table, "Ledger table added");

        Ok(InitOutcome::TableAdded)
    }
}
