//! Event-log ledger
//!
//! Each row is its own immutable object, `<prefix>/<table>/<ulid>.json`.
//! ULIDs from one generator are strictly increasing, so listing the prefix
//! in key order yields rows in append order.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{AppendReceipt, InitOutcome, Ledger, LedgerRow};
use crate::error::{LedgerError, StorageError};
use crate::storage::{ObjectStore, Precondition, PutOptions};

/// Event-log ledger for one table
pub struct EventLogLedger {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    /// Always ends with '/'
    prefix: String,
    generator: Mutex<ulid::Generator>,
}

impl EventLogLedger {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str, event_prefix: &str, table: &str) -> Self {
        let root = event_prefix.trim_end_matches('/');
        let prefix = if root.is_empty() {
            format!("{}/", table)
        } else {
            format!("{}/{}/", root, table)
        };

        Self {
            store,
            bucket: bucket.to_string(),
            prefix,
            generator: Mutex::new(ulid::Generator::new()),
        }
    }

    fn next_key(&self) -> Result<String, LedgerError> {
        let mut generator = self
            .generator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = generator
            .generate()
            .map_err(|e| LedgerError::InsertFailed(format!("event id: {}", e)))?;
        Ok(format!("{}{}.json", self.prefix, id))
    }
}

#[async_trait]
impl Ledger for EventLogLedger {
    async fn append_row(&self, row: &LedgerRow) -> Result<AppendReceipt, LedgerError> {
        let key = self.next_key()?;
        let body = serde_json::to_vec(row)
            .map_err(|e| LedgerError::InsertFailed(format!("encoding row: {}", e)))?;
        let size = body.len();

        let result = self
            .store
            .put_object(
                &self.bucket,
                &key,
                body,
                PutOptions::default()
                    .content_type("application/json")
                    .precondition(Precondition::IfNoneMatch),
            )
            .await;

        let etag = match result {
            Ok(etag) => etag,
            Err(StorageError::PreconditionFailed { bucket, key }) => {
                crate::metrics::LEDGER_APPENDS_TOTAL
                    .with_label_values(&["conflict"])
                    .inc();
                return Err(LedgerError::Conflict { bucket, key });
            }
            Err(error) => {
                crate::metrics::LEDGER_APPENDS_TOTAL
                    .with_label_values(&["persist_failed"])
                    .inc();
                tracing::warn!(bucket = %self.bucket, key = %key, %error, "Ledger event write failed");
                return Err(LedgerError::PersistFailed(error));
            }
        };

        crate::metrics::LEDGER_APPENDS_TOTAL
            .with_label_values(&["ok"])
            .inc();
        tracing::info!(bucket = %self.bucket, key = %key, size, "Ledger event appended");

        Ok(AppendReceipt {
            key,
            rowid: None,
            etag,
            size,
        })
    }

    async fn rows(&self) -> Result<Vec<LedgerRow>, LedgerError> {
        let keys = self
            .store
            .list_keys(&self.bucket, &self.prefix)
            .await
            .map_err(LedgerError::FetchFailed)?;

        let mut rows = Vec::with_capacity(keys.len());
        for key in keys.iter().filter(|key| key.ends_with(".json")) {
            let object = self
                .store
                .get_object(&self.bucket, key)
                .await
                .map_err(LedgerError::FetchFailed)?;
            let row: LedgerRow = serde_json::from_slice(&object.body)
                .map_err(|e| LedgerError::Read(format!("{}: {}", key, e)))?;
            rows.push(row);
        }

        Ok(rows)
    }

    async fn initialize(&self) -> Result<InitOutcome, LedgerError> {
        // Nothing to create: the first append starts the log.
        Ok(InitOutcome::AlreadyInitialized)
    }
}
