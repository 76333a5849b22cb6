use serde::{Deserialize, Serialize};

/// Serialized form of one cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub timestamp: i64,
    pub ttl: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, timestamp: i64, ttl: u64) -> Self {
        Self {
            value,
            timestamp,
            ttl,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        is_expired(self.timestamp, self.ttl, now_ms)
    }
}

/// Entry metadata without the payload; used when scanning the store.
#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct EntryHeader {
    pub timestamp: i64,
    pub ttl: u64,
}

impl EntryHeader {
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        is_expired(self.timestamp, self.ttl, now_ms)
    }
}

fn is_expired(timestamp: i64, ttl: u64, now_ms: i64) -> bool {
    let age = i128::from(now_ms) - i128::from(timestamp);
    age > i128::from(ttl)
}
