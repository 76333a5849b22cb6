use std::process::ExitCode;

use clap::{Parser, Subcommand};
use danci_review_cache::config::Config;
use danci_review_cache::logging::init_tracing;
use danci_review_cache::{FileStore, LocalCache, SystemClock};

#[derive(Parser)]
#[command(
    name = "review-cache",
    about = "Inspect and maintain the local review cache",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print cache statistics as JSON
    Stats,
    /// Delete every cached entry (counters are kept)
    Clear,
    /// Delete expired and unreadable entries
    PurgeExpired,
    /// Evict the oldest half of the entries
    Evict,
    /// Delete entries whose key matches a regex, after the namespace
    RemovePattern {
        /// Regex matched against the key without its namespace prefix
        pattern: String,
    },
    /// Zero the hit/miss counters
    ResetStats,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config.log_level);

    let store = match FileStore::open(&config.cache.store_path, config.cache.max_bytes) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(
                error = %err,
                path = %config.cache.store_path.display(),
                "failed to open cache store"
            );
            return ExitCode::FAILURE;
        }
    };
    let cache = LocalCache::new(store, SystemClock, config.cache.clone());

    match cli.command {
        Command::Stats => match serde_json::to_string_pretty(&cache.stats()) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                tracing::error!(error = %err, "failed to render stats");
                return ExitCode::FAILURE;
            }
        },
        Command::Clear => println!("removed {} entries", cache.clear()),
        Command::PurgeExpired => println!("removed {} expired entries", cache.purge_expired()),
        Command::Evict => println!("evicted {} entries", cache.evict()),
        Command::RemovePattern { pattern } => match cache.remove_pattern(&pattern) {
            Ok(removed) => println!("removed {removed} entries"),
            Err(err) => {
                tracing::error!(error = %err, pattern = %pattern, "remove-pattern failed");
                return ExitCode::FAILURE;
            }
        },
        Command::ResetStats => {
            cache.reset_stats();
            println!("counters reset");
        }
    }

    ExitCode::SUCCESS
}
