pub mod cache;
pub mod clock;
pub mod config;
pub mod logging;
pub mod repository;
pub mod scheduler;
pub mod store;

pub use cache::{CacheError, CacheStats, LocalCache, SetOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, Config};
pub use repository::{DocumentStore, RemoteError, RepositoryError, ReviewRepository};
pub use scheduler::{due_queue, grade, try_grade, Grade, ReviewState, ReviewStateError};
pub use store::{file::FileStore, memory::MemoryStore, KeyValueStore, StoreError};
