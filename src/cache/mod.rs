//! TTL cache layered over a shared [`KeyValueStore`].
//!
//! Every entry lives under the configured namespace and carries its own
//! timestamp and TTL. Expired entries are dropped lazily on read. When the
//! store reports its quota is exhausted, the oldest half of the entries is
//! evicted by write timestamp (no access tracking) and the write is retried
//! once.
//!
//! Storage failures never surface from `get`, `set`, `has`, `remove` or
//! `clear`; they are logged and counted in [`CacheCounters::errors`]. The
//! counters themselves are persisted best-effort under a separate stats key.

pub mod entry;
pub mod keys;
pub mod stats;

use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::store::{item_size, utf16_size, KeyValueStore};

pub use entry::CacheEntry;
use entry::EntryHeader;
pub use stats::{CacheCounters, CacheStats};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid key pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// What happened to a `set`. None of these is an error for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Stored,
    /// The store was full; entries were evicted and the retry succeeded.
    StoredAfterEviction,
    /// Serialized entry exceeded the per-entry cap; nothing was written.
    Skipped,
    /// The write failed (including the retry after eviction).
    Failed,
}

impl SetOutcome {
    pub fn is_stored(self) -> bool {
        matches!(self, SetOutcome::Stored | SetOutcome::StoredAfterEviction)
    }
}

pub struct LocalCache<S, C> {
    store: S,
    clock: C,
    config: CacheConfig,
    counters: Mutex<CacheCounters>,
}

impl<S: KeyValueStore, C: Clock> LocalCache<S, C> {
    pub fn new(store: S, clock: C, config: CacheConfig) -> Self {
        let counters = store
            .get_item(&config.stats_key)
            .and_then(|raw| serde_json::from_str::<CacheCounters>(&raw).ok())
            .unwrap_or_default();

        Self {
            store,
            clock,
            config,
            counters: Mutex::new(counters),
        }
    }

    pub fn with_defaults(store: S, clock: C) -> Self {
        Self::new(store, clock, CacheConfig::default())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn counters(&self) -> CacheCounters {
        *self.counters.lock()
    }

    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let full_key = self.namespaced(key);
        let Some(raw) = self.store.get_item(&full_key) else {
            self.bump(|c| c.misses += 1);
            return None;
        };

        match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(entry) if entry.is_expired(self.clock.now_ms()) => {
                self.delete_raw(&full_key);
                self.bump(|c| c.misses += 1);
                None
            }
            Ok(entry) => {
                self.bump(|c| c.hits += 1);
                Some(entry.value)
            }
            Err(err) => {
                tracing::debug!(key = %full_key, error = %err, "unreadable cache entry");
                self.bump(|c| {
                    c.misses += 1;
                    c.errors += 1;
                });
                None
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        let full_key = self.namespaced(key);
        let Some(header) = self
            .store
            .get_item(&full_key)
            .as_deref()
            .and_then(EntryHeader::parse)
        else {
            return false;
        };

        if header.is_expired(self.clock.now_ms()) {
            self.delete_raw(&full_key);
            return false;
        }
        true
    }

    /// Stores `value` for `ttl`, or the configured default TTL.
    pub fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> SetOutcome
    where
        T: Serialize + ?Sized,
    {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let entry = CacheEntry::new(value, self.clock.now_ms(), ttl_ms);

        let payload = match serde_json::to_string(&entry) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to serialize cache entry");
                self.bump(|c| c.errors += 1);
                return SetOutcome::Failed;
            }
        };

        let size = utf16_size(&payload);
        let limit = self.config.max_entry_bytes();
        if size > limit {
            tracing::warn!(key, size, limit, "cache entry too large, not cached");
            return SetOutcome::Skipped;
        }

        let full_key = self.namespaced(key);
        match self.store.set_item(&full_key, &payload) {
            Ok(()) => {
                self.bump(|c| c.sets += 1);
                SetOutcome::Stored
            }
            Err(err) if err.is_quota_exceeded() => {
                let evicted = self.evict();
                tracing::warn!(key, evicted, "storage quota exceeded, evicted old entries");

                match self.store.set_item(&full_key, &payload) {
                    Ok(()) => {
                        self.bump(|c| c.sets += 1);
                        SetOutcome::StoredAfterEviction
                    }
                    Err(err) => {
                        tracing::error!(key, error = %err, "cache write failed after eviction");
                        self.bump(|c| c.errors += 1);
                        SetOutcome::Failed
                    }
                }
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "cache write failed");
                self.bump(|c| c.errors += 1);
                SetOutcome::Failed
            }
        }
    }

    pub fn remove(&self, key: &str) {
        let full_key = self.namespaced(key);
        if self.delete_raw(&full_key) {
            self.bump(|c| c.removes += 1);
        }
    }

    /// Removes every entry whose namespaced key matches `namespace + pattern`.
    pub fn remove_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let regex = Regex::new(&format!(
            "^{}{}",
            regex::escape(&self.config.namespace),
            pattern
        ))?;

        let mut removed = 0;
        for key in self.namespaced_keys() {
            if regex.is_match(&key) && self.delete_raw(&key) {
                removed += 1;
            }
        }

        self.bump(|c| c.removes += removed as u64);
        Ok(removed)
    }

    /// Deletes every namespaced entry. Keys outside the namespace, including
    /// the stats key, are left alone.
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        for key in self.namespaced_keys() {
            if self.delete_raw(&key) {
                removed += 1;
            }
        }

        self.bump(|c| c.clears += 1);
        tracing::debug!(removed, "cache cleared");
        removed
    }

    /// Read-only snapshot. Expired entries are counted, not deleted.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now_ms();
        let mut stats = CacheStats {
            counters: self.counters(),
            ..Default::default()
        };

        for key in self.namespaced_keys() {
            let Some(raw) = self.store.get_item(&key) else {
                continue;
            };
            stats.total_entries += 1;
            stats.size_in_bytes += item_size(&key, &raw);

            match EntryHeader::parse(&raw) {
                Some(header) if !header.is_expired(now) => stats.valid_entries += 1,
                _ => stats.expired_entries += 1,
            }
        }

        stats
    }

    /// Drops unreadable entries, then the oldest half of the rest by write
    /// timestamp. Returns how many entries were removed.
    pub fn evict(&self) -> usize {
        let mut removed = 0;
        let mut dated = Vec::new();

        for key in self.namespaced_keys() {
            match self
                .store
                .get_item(&key)
                .as_deref()
                .and_then(EntryHeader::parse)
            {
                Some(header) => dated.push((header.timestamp, key)),
                None => {
                    if self.delete_raw(&key) {
                        removed += 1;
                    }
                }
            }
        }

        dated.sort();
        let oldest = dated.len().div_ceil(2);
        for (_, key) in dated.into_iter().take(oldest) {
            if self.delete_raw(&key) {
                removed += 1;
            }
        }

        removed
    }

    /// Eagerly deletes expired and unreadable entries.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;

        for key in self.namespaced_keys() {
            let expired = self
                .store
                .get_item(&key)
                .as_deref()
                .and_then(EntryHeader::parse)
                .map_or(true, |header| header.is_expired(now));

            if expired && self.delete_raw(&key) {
                removed += 1;
            }
        }

        removed
    }

    pub fn reset_stats(&self) {
        let mut counters = self.counters.lock();
        *counters = CacheCounters::default();
        self.persist_counters(&counters);
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.config.namespace, key)
    }

    fn namespaced_keys(&self) -> Vec<String> {
        self.store
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(&self.config.namespace) && *key != self.config.stats_key)
            .collect()
    }

    fn delete_raw(&self, full_key: &str) -> bool {
        match self.store.remove_item(full_key) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(key = %full_key, error = %err, "failed to remove cache entry");
                self.bump(|c| c.errors += 1);
                false
            }
        }
    }

    /// Updates the counters and persists them under the same lock, so the
    /// stored snapshot never goes backwards.
    fn bump(&self, update: impl FnOnce(&mut CacheCounters)) {
        let mut counters = self.counters.lock();
        update(&mut counters);
        self.persist_counters(&counters);
    }

    fn persist_counters(&self, counters: &CacheCounters) {
        let payload = match serde_json::to_string(counters) {
            Ok(payload) => payload,
            Err(_) => return,
        };
        if let Err(err) = self.store.set_item(&self.config.stats_key, &payload) {
            tracing::debug!(error = %err, "failed to persist cache stats");
        }
    }
}
