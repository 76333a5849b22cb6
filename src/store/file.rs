use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{item_size, KeyValueStore, StoreError};

pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("com.danci.app")
        .join("review-cache.json")
}

#[derive(Debug)]
struct Inner {
    items: BTreeMap<String, String>,
    used_bytes: usize,
}

/// Store persisted as one JSON object on disk. Every mutation rewrites the
/// file through a temporary sibling and a rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    quota_bytes: usize,
    inner: Mutex<Inner>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>, quota_bytes: usize) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let items: BTreeMap<String, String> = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        let used_bytes = items.iter().map(|(k, v)| item_size(k, v)).sum();

        tracing::debug!(path = %path.display(), items = items.len(), "file store opened");

        Ok(Self {
            path,
            quota_bytes,
            inner: Mutex::new(Inner { items, used_bytes }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn used_bytes(&self) -> usize {
        self.inner.lock().used_bytes
    }

    fn flush(&self, items: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let payload = serde_json::to_string(items)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
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
        if projected > self.quota_bytes {
            return Err(StoreError::QuotaExceeded {
                requested,
                available: self.quota_bytes.saturating_sub(inner.used_bytes - replaced),
            });
        }

        let previous = inner.items.insert(key.to_string(), value.to_string());
        if let Err(err) = self.flush(&inner.items) {
            match previous {
                Some(old) => inner.items.insert(key.to_string(), old),
                None => inner.items.remove(key),
            };
            return Err(err);
        }
        inner.used_bytes = projected;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let Some(old) = inner.items.remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.flush(&inner.items) {
            inner.items.insert(key.to_string(), old);
            return Err(err);
        }
        inner.used_bytes -= item_size(key, &old);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.inner.lock().items.keys().cloned().collect()
    }
}
