use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{item_size, KeyValueStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    items: BTreeMap<String, String>,
    used_bytes: usize,
}

/// In-process store. With a quota it rejects writes the way browser storage
/// does once the budget is used up.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.inner.lock().used_bytes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.inner.lock().items.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let replaced = inner
            .items
            .get(key)
            .map(|old| item_size(key, old))
            .unwrap_or(0);
        let requested = item_size(key, value);
        let projected = inner.used_bytes - replaced + requested;

        if let Some(quota) = self.quota_bytes {
            if projected > quota {
                return Err(StoreError::QuotaExceeded {
                    requested,
                    available: quota.saturating_sub(inner.used_bytes - replaced),
                });
            }
        }

        inner.items.insert(key.to_string(), value.to_string());
        inner.used_bytes = projected;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(old) = inner.items.remove(key) {
            inner.used_bytes -= item_size(key, &old);
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.inner.lock().items.keys().cloned().collect()
    }
}
