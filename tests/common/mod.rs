#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use danci_review_cache::{
    DocumentStore, KeyValueStore, MemoryStore, RemoteError, ReviewState, StoreError,
};

/// Wraps a [`MemoryStore`] and counts calls reaching the backing store.
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub removes: AtomicUsize,
    pub sets: AtomicUsize,
}

impl RecordingStore {
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            inner: MemoryStore::with_quota(quota_bytes),
            ..Default::default()
        }
    }

    pub fn remove_calls(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for RecordingStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_item(key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}

/// Store whose writes and deletes always fail, as a full read-only disk would.
#[derive(Debug, Default)]
pub struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get_item(&self, _key: &str) -> Option<String> {
        None
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::QuotaExceeded {
            requested: 1,
            available: 0,
        })
    }

    fn remove_item(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only store",
        )))
    }

    fn keys(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<String, ReviewState>>,
    pub get_calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
    pub fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryDocumentStore {
    pub fn insert(&self, id: &str, state: ReviewState) {
        self.docs.lock().insert(id.to_string(), state);
    }

    pub fn doc(&self, id: &str) -> Option<ReviewState> {
        self.docs.lock().get(id).cloned()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, id: &str) -> Result<Option<ReviewState>, RemoteError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.docs.lock().get(id).cloned())
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<ReviewState>, RemoteError> {
        self.batch_sizes.lock().push(ids.len());
        let docs = self.docs.lock();
        Ok(ids.iter().filter_map(|id| docs.get(id).cloned()).collect())
    }

    async fn set(&self, id: &str, record: &ReviewState) -> Result<(), RemoteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("write rejected in test".to_string()));
        }
        self.docs.lock().insert(id.to_string(), record.clone());
        Ok(())
    }
}
