use std::path::PathBuf;
use std::time::Duration;

use crate::cache::keys::{DEFAULT_NAMESPACE, DEFAULT_STATS_KEY, DEFAULT_TTL};
use crate::store::file::default_store_path;
use crate::store::DEFAULT_QUOTA_BYTES;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub cache: CacheConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            log_level,
            cache: CacheConfig::from_env(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Prefix of every entry key; keys outside it are never touched.
    pub namespace: String,
    pub stats_key: String,
    pub default_ttl: Duration,
    /// Total storage budget. A single entry may use at most a tenth of it.
    pub max_bytes: usize,
    pub store_path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            stats_key: DEFAULT_STATS_KEY.to_string(),
            default_ttl: DEFAULT_TTL,
            max_bytes: DEFAULT_QUOTA_BYTES,
            store_path: default_store_path(),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let namespace = env_non_empty("CACHE_NAMESPACE").unwrap_or(defaults.namespace);
        let stats_key = env_non_empty("CACHE_STATS_KEY").unwrap_or(defaults.stats_key);
        let default_ttl_ms = env_u64("CACHE_DEFAULT_TTL_MS", defaults.default_ttl.as_millis() as u64);
        let max_bytes = env_usize("CACHE_MAX_BYTES", defaults.max_bytes);
        let store_path = env_non_empty("CACHE_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);

        Self {
            namespace,
            stats_key,
            default_ttl: Duration::from_millis(default_ttl_ms),
            max_bytes,
            store_path,
        }
    }

    pub fn max_entry_bytes(&self) -> usize {
        self.max_bytes / 10
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}
