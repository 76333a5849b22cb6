//! Host-provided persistent key/value storage.
//!
//! The cache only ever talks to a [`KeyValueStore`]; it never assumes which
//! keys exist beyond its own namespace, since other data may share the store.

pub mod file;
pub mod memory;

use std::sync::Arc;

use thiserror::Error;

/// Default storage budget, mirroring the common browser quota of 5 MiB.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage quota exceeded: requested {requested} bytes, {available} available")]
    QuotaExceeded { requested: usize, available: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("corrupt store file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove_item(&self, key: &str) -> Result<(), StoreError>;

    /// Every key currently held, in no particular order.
    fn keys(&self) -> Vec<String>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove_item(key)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }
}

/// Storage cost of a string: two bytes per UTF-16 code unit.
pub fn utf16_size(value: &str) -> usize {
    value.encode_utf16().count() * 2
}

pub(crate) fn item_size(key: &str, value: &str) -> usize {
    utf16_size(key) + utf16_size(value)
}
