use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use danci_review_cache::cache::CacheCounters;
use danci_review_cache::{
    CacheConfig, KeyValueStore, LocalCache, ManualClock, MemoryStore, SetOutcome, SystemClock,
};

mod common;

use common::{BrokenStore, RecordingStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WordRecord {
    id: String,
    spelling: String,
    meanings: Vec<String>,
}

fn word(id: &str) -> WordRecord {
    WordRecord {
        id: id.to_string(),
        spelling: "ephemeral".to_string(),
        meanings: vec!["lasting a very short time".to_string()],
    }
}

fn memory_cache() -> LocalCache<Arc<MemoryStore>, Arc<ManualClock>> {
    LocalCache::with_defaults(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::from_millis(1_700_000_000_000)),
    )
}

#[test]
fn test_round_trip_within_ttl() {
    let cache = memory_cache();
    assert_eq!(
        cache.set("w1", &word("w1"), Some(Duration::from_millis(1000))),
        SetOutcome::Stored
    );
    assert_eq!(cache.get::<WordRecord>("w1"), Some(word("w1")));
    assert!(cache.has("w1"));

    let counters = cache.counters();
    assert_eq!(counters.sets, 1);
    assert_eq!(counters.hits, 1);
}

#[test]
fn test_expired_entry_is_removed_on_read() {
    let store = Arc::new(RecordingStore::default());
    let clock = Arc::new(ManualClock::from_millis(0));
    let cache = LocalCache::with_defaults(store.clone(), clock.clone());

    cache.set("w1", &word("w1"), Some(Duration::from_millis(1)));
    clock.advance(Duration::from_millis(5));

    assert_eq!(cache.get::<WordRecord>("w1"), None);
    assert_eq!(store.remove_calls(), 1);
    assert!(store.get_item("vocab_cache:w1").is_none());
    assert_eq!(cache.counters().misses, 1);
}

#[test]
fn test_expiry_after_ttl_window() {
    let cache = memory_cache();
    cache.set("w1", &word("w1"), Some(Duration::from_millis(100)));

    cache.clock().advance(Duration::from_millis(100));
    assert!(cache.has("w1"));

    cache.clock().advance(Duration::from_millis(50));
    assert!(!cache.has("w1"));
    assert_eq!(cache.get::<WordRecord>("w1"), None);
}

#[test]
fn test_has_deletes_expired_entry() {
    let store = Arc::new(RecordingStore::default());
    let clock = Arc::new(ManualClock::from_millis(0));
    let cache = LocalCache::with_defaults(store.clone(), clock.clone());

    cache.set("w1", &word("w1"), Some(Duration::from_millis(10)));
    clock.advance(Duration::from_millis(11));

    assert!(!cache.has("w1"));
    assert_eq!(store.remove_calls(), 1);
    assert!(store.get_item("vocab_cache:w1").is_none());
    // `has` leaves the hit/miss counters alone.
    assert_eq!(cache.counters().misses, 0);
}

#[test]
fn test_expiry_with_system_clock() {
    let cache = LocalCache::with_defaults(MemoryStore::new(), SystemClock);
    cache.set("w1", &word("w1"), Some(Duration::from_millis(1)));
    std::thread::sleep(Duration::from_millis(5));
    assert_eq!(cache.get::<WordRecord>("w1"), None);
}

#[test]
fn test_miss_and_corrupt_entries() {
    let cache = memory_cache();
    assert_eq!(cache.get::<WordRecord>("absent"), None);

    cache.store().set_item("vocab_cache:bad", "{oops").unwrap();
    assert_eq!(cache.get::<WordRecord>("bad"), None);
    assert!(!cache.has("bad"));

    let counters = cache.counters();
    assert_eq!(counters.misses, 2);
    assert_eq!(counters.errors, 1);
    assert_eq!(counters.hits, 0);
}

#[test]
fn test_oversize_entry_is_skipped() {
    let config = CacheConfig {
        max_bytes: 1_000,
        ..CacheConfig::default()
    };
    let cache = LocalCache::new(MemoryStore::new(), ManualClock::from_millis(0), config);

    let big = "x".repeat(200);
    assert_eq!(cache.set("big", &big, None), SetOutcome::Skipped);
    assert_eq!(cache.get::<String>("big"), None);
    assert_eq!(cache.counters().sets, 0);

    assert_eq!(cache.set("small", &"ok", None), SetOutcome::Stored);
}

#[test]
fn test_quota_pressure_evicts_oldest_half() {
    let store = Arc::new(RecordingStore::with_quota(4_000));
    let clock = Arc::new(ManualClock::from_millis(0));
    let cache = LocalCache::with_defaults(store.clone(), clock.clone());

    let mut written: Vec<String> = Vec::new();
    let mut pressured = None;
    for i in 0..200 {
        clock.advance(Duration::from_millis(10));
        let key = format!("w{i:03}");
        let outcome = cache.set(&key, &word(&key), None);
        written.push(key);
        if outcome != SetOutcome::Stored {
            pressured = Some(outcome);
            break;
        }
    }

    assert_eq!(pressured, Some(SetOutcome::StoredAfterEviction));
    let (last, prior) = written.split_last().unwrap();
    assert!(prior.len() >= 2);
    assert!(cache.has(last));

    let survivors: Vec<&String> = prior.iter().filter(|k| cache.has(k)).collect();
    assert!(survivors.len() <= prior.len() / 2);
    // Oldest entries go first.
    assert!(!cache.has(&prior[0]));
    assert!(survivors.iter().all(|k| *k > &prior[prior.len().div_ceil(2) - 1]));
}

#[test]
fn test_write_failure_is_reported_not_raised() {
    let cache = LocalCache::with_defaults(BrokenStore, ManualClock::from_millis(0));
    assert_eq!(cache.set("w1", &word("w1"), None), SetOutcome::Failed);
    assert_eq!(cache.get::<WordRecord>("w1"), None);
    assert_eq!(cache.counters().errors, 1);
}

#[test]
fn test_remove_and_remove_pattern() {
    let cache = memory_cache();
    for key in ["review:u1:a", "review:u1:b", "review:u2:a", "word:a"] {
        cache.set(key, &1u8, None);
    }

    cache.remove("word:a");
    assert!(!cache.has("word:a"));

    assert_eq!(cache.remove_pattern("review:u1:").unwrap(), 2);
    assert!(!cache.has("review:u1:a"));
    assert!(cache.has("review:u2:a"));
    assert_eq!(cache.counters().removes, 3);
}

#[test]
fn test_remove_pattern_fragment_is_a_regex() {
    let cache = memory_cache();
    for key in ["review:u1:a", "review:u1:b", "review:u1:c", "review:u2:a"] {
        cache.set(key, &1u8, None);
    }

    assert_eq!(cache.remove_pattern("review:u1:(a|b)$").unwrap(), 2);
    assert!(!cache.has("review:u1:a"));
    assert!(!cache.has("review:u1:b"));
    assert!(cache.has("review:u1:c"));
    assert!(cache.has("review:u2:a"));

    assert!(cache.remove_pattern("review:(").is_err());
}

#[test]
fn test_namespace_is_matched_literally() {
    let config = CacheConfig {
        namespace: "v+:".to_string(),
        ..CacheConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let cache = LocalCache::new(store.clone(), ManualClock::from_millis(0), config);
    cache.set("a1", &1u8, None);
    store.set_item("vv:a1", "kept").unwrap();

    assert_eq!(cache.remove_pattern("a").unwrap(), 1);
    assert!(store.get_item("v+:a1").is_none());
    assert_eq!(store.get_item("vv:a1").as_deref(), Some("kept"));
}

#[test]
fn test_failed_remove_counts_as_error_not_removal() {
    let cache = LocalCache::with_defaults(BrokenStore, ManualClock::from_millis(0));
    cache.remove("w1");

    let counters = cache.counters();
    assert_eq!(counters.removes, 0);
    assert_eq!(counters.errors, 1);
}

#[test]
fn test_persisted_counters_match_memory_under_contention() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(LocalCache::with_defaults(
        store.clone(),
        ManualClock::from_millis(0),
    ));
    cache.set("a", &1u8, None);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            scope.spawn(move || {
                for _ in 0..200 {
                    let _ = cache.get::<u8>("a");
                    let _ = cache.get::<u8>("missing");
                }
            });
        }
    });

    let raw = store.get_item("vocab_cache_stats").unwrap();
    let persisted: CacheCounters = serde_json::from_str(&raw).unwrap();
    assert_eq!(persisted, cache.counters());
    assert_eq!(persisted.hits, 800);
    assert_eq!(persisted.misses, 800);
}

#[test]
fn test_clear_leaves_foreign_keys() {
    let cache = memory_cache();
    cache.store().set_item("settings:theme", "dark").unwrap();
    cache.set("a", &1u8, None);
    cache.set("b", &2u8, None);

    assert_eq!(cache.clear(), 2);
    assert_eq!(cache.store().get_item("settings:theme").as_deref(), Some("dark"));
    assert!(!cache.has("a"));
    assert_eq!(cache.counters().clears, 1);
    // Counters outlive the clear.
    assert_eq!(cache.counters().sets, 2);
}

#[test]
fn test_stats_scan_is_read_only() {
    let cache = memory_cache();
    cache.set("short", &"s", Some(Duration::from_millis(10)));
    cache.set("long", &"l", None);
    cache.store().set_item("unrelated", "zzz").unwrap();
    cache.clock().advance(Duration::from_millis(50));

    let stats = cache.stats();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.valid_entries, 1);
    assert_eq!(stats.expired_entries, 1);
    assert_eq!(stats.counters.sets, 2);

    let expected_bytes: usize = ["vocab_cache:short", "vocab_cache:long"]
        .iter()
        .map(|key| {
            let raw = cache.store().get_item(key).unwrap();
            (key.encode_utf16().count() + raw.encode_utf16().count()) * 2
        })
        .sum();
    assert_eq!(stats.size_in_bytes, expected_bytes);

    // The expired entry is still physically present.
    assert!(cache.store().get_item("vocab_cache:short").is_some());
    assert_eq!(cache.purge_expired(), 1);
    assert_eq!(cache.stats().total_entries, 1);
}

#[test]
fn test_reset_stats() {
    let cache = memory_cache();
    cache.set("a", &1u8, None);
    let _ = cache.get::<u8>("a");
    cache.reset_stats();
    assert_eq!(cache.counters(), CacheCounters::default());
    assert_eq!(
        cache.store().get_item("vocab_cache_stats").as_deref(),
        Some(r#"{"hits":0,"misses":0,"sets":0,"removes":0,"clears":0,"errors":0}"#)
    );
}
