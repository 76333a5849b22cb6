use std::time::Duration;

pub const DEFAULT_NAMESPACE: &str = "vocab_cache:";
pub const DEFAULT_STATS_KEY: &str = "vocab_cache_stats";
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub const REVIEW_STATE_TTL: Duration = Duration::from_secs(60 * 60);

pub fn review_state_key(user_id: &str, word_id: &str) -> String {
    format!("review:{}:{}", user_id, word_id)
}

/// Pattern (relative to the namespace) matching every review key of one user.
pub fn user_review_pattern(user_id: &str) -> String {
    format!("review:{}:", regex::escape(user_id))
}
