//! In-memory object store
//!
//! Behaves like S3 for the calls this crate makes (ETags, conditional puts,
//! prefix listing) and records every call so tests can assert on ordering.
//! Available in all builds so integration tests and local dry runs can use it.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use super::{ObjectStore, Precondition, PutOptions, StoredObject};
use crate::CallLog;
use crate::error::StorageError;

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get {
        bucket: String,
        key: String,
    },
    Put {
        bucket: String,
        key: String,
        content_type: Option<String>,
        public_read: bool,
        precondition: Precondition,
    },
    List {
        bucket: String,
        prefix: String,
    },
}

#[derive(Debug, Clone)]
struct Entry {
    body: Vec<u8>,
    etag: String,
    content_type: Option<String>,
    public_read: bool,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<(String, String), Entry>,
    next_version: u64,
    calls: Vec<StoreCall>,
    get_failures: HashMap<(String, String), StorageError>,
    put_failures: HashMap<(String, String), StorageError>,
}

/// In-memory [`ObjectStore`]
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    state: Arc<Mutex<State>>,
    journal: Option<CallLog>,
    get_barrier: Option<Arc<tokio::sync::Barrier>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror every call into a journal shared with other test doubles
    pub fn with_journal(mut self, journal: CallLog) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Hold every `get_object` until `parties` gets have happened
    ///
    /// Lets tests line up overlapping read-modify-write cycles deterministically.
    pub fn with_get_barrier(mut self, parties: usize) -> Self {
        self.get_barrier = Some(Arc::new(tokio::sync::Barrier::new(parties)));
        self
    }

    /// Seed an object
    pub fn insert(&self, bucket: &str, key: &str, body: Vec<u8>) -> String {
        let mut state = self.lock();
        let etag = next_etag(&mut state);
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            Entry {
                body,
                etag: etag.clone(),
                content_type: None,
                public_read: false,
            },
        );
        etag
    }

    /// Current body of an object, if present
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.body.clone())
    }

    /// Content type and public-read flag an object was stored with
    pub fn object_metadata(&self, bucket: &str, key: &str) -> Option<(Option<String>, bool)> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| (entry.content_type.clone(), entry.public_read))
    }

    /// Make every `get_object` of this key fail
    pub fn fail_get(&self, bucket: &str, key: &str, error: StorageError) {
        self.lock()
            .get_failures
            .insert((bucket.to_string(), key.to_string()), error);
    }

    /// Make every `put_object` to this key fail
    pub fn fail_put(&self, bucket: &str, key: &str, error: StorageError) {
        self.lock()
            .put_failures
            .insert((bucket.to_string(), key.to_string()), error);
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, state: &mut State, call: StoreCall) {
        if let Some(journal) = &self.journal {
            let line = match &call {
                StoreCall::Get { bucket, key } => format!("store:get {}/{}", bucket, key),
                StoreCall::Put { bucket, key, .. } => format!("store:put {}/{}", bucket, key),
                StoreCall::List { bucket, prefix } => format!("store:list {}/{}", bucket, prefix),
            };
            journal
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(line);
        }
        state.calls.push(call);
    }
}

fn next_etag(state: &mut State) -> String {
    state.next_version += 1;
    format!("\"v{}\"", state.next_version)
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        let result = {
            let mut state = self.lock();
            self.record(
                &mut state,
                StoreCall::Get {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                },
            );

            let id = (bucket.to_string(), key.to_string());
            if let Some(error) = state.get_failures.get(&id) {
                Err(error.clone())
            } else {
                state
                    .objects
                    .get(&id)
                    .map(|entry| StoredObject {
                        body: entry.body.clone(),
                        etag: Some(entry.etag.clone()),
                    })
                    .ok_or_else(|| StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    })
            }
        };

        if let Some(barrier) = &self.get_barrier {
            barrier.wait().await;
        }

        result
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        options: PutOptions,
    ) -> Result<Option<String>, StorageError> {
        let mut state = self.lock();
        self.record(
            &mut state,
            StoreCall::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: options.content_type.clone(),
                public_read: options.public_read,
                precondition: options.precondition.clone(),
            },
        );

        let id = (bucket.to_string(), key.to_string());
        if let Some(error) = state.put_failures.get(&id) {
            return Err(error.clone());
        }

        let current = state.objects.get(&id).map(|entry| entry.etag.as_str());
        let allowed = match (&options.precondition, current) {
            (Precondition::None, _) => true,
            (Precondition::IfMatch(expected), Some(actual)) => expected == actual,
            (Precondition::IfMatch(_), None) => false,
            (Precondition::IfNoneMatch, current) => current.is_none(),
        };
        if !allowed {
            return Err(StorageError::PreconditionFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        let etag = next_etag(&mut state);
        state.objects.insert(
            id,
            Entry {
                body,
                etag: etag.clone(),
                content_type: options.content_type,
                public_read: options.public_read,
            },
        );
        Ok(Some(etag))
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut state = self.lock();
        self.record(
            &mut state,
            StoreCall::List {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
            },
        );

        Ok(state
            .objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_object_is_not_found() {
        let store = MemoryObjectStore::new();
        let error = store.get_object("ledger", "social.db").await.unwrap_err();
        assert!(matches!(error, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn if_match_rejects_stale_etag() {
        let store = MemoryObjectStore::new();
        let first = store.insert("ledger", "social.db", b"one".to_vec());
        store
            .put_object("ledger", "social.db", b"two".to_vec(), PutOptions::default())
            .await
            .unwrap();

        let error = store
            .put_object(
                "ledger",
                "social.db",
                b"three".to_vec(),
                PutOptions::default().precondition(Precondition::IfMatch(first)),
            )
            .await
            .unwrap_err();

        assert!(matches!(error, StorageError::PreconditionFailed { .. }));
        assert_eq!(store.object("ledger", "social.db").unwrap(), b"two");
    }

    #[tokio::test]
    async fn if_none_match_only_creates() {
        let store = MemoryObjectStore::new();
        let create = PutOptions::default().precondition(Precondition::IfNoneMatch);

        store
            .put_object("ledger", "a", b"1".to_vec(), create.clone())
            .await
            .unwrap();
        let error = store
            .put_object("ledger", "a", b"2".to_vec(), create)
            .await
            .unwrap_err();

        assert!(matches!(error, StorageError::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn list_keys_filters_by_bucket_and_prefix() {
        let store = MemoryObjectStore::new();
        store.insert("ledger", "events/b.json", Vec::new());
        store.insert("ledger", "events/a.json", Vec::new());
        store.insert("ledger", "social.db", Vec::new());
        store.insert("media", "events/c.json", Vec::new());

        let keys = store.list_keys("ledger", "events/").await.unwrap();
        assert_eq!(keys, vec!["events/a.json", "events/b.json"]);
    }
}
