//! Post list cache.
//!
//! The gateway keeps normalized post collections in a key-value store with expiring entries:
//!
//! - **Keys** are derived from the request descriptor (`keys.rs`) and are stable across
//!   restarts, so a pre-warmed store stays usable.
//! - **Values** are schema-versioned JSON envelopes (`envelope.rs`); anything that does not
//!   decode is treated as absent by callers.
//! - **Stores** implement [`CacheStore`]. Redis lives in `infra::redis`; an in-process LRU store
//!   is provided here for single-instance deployments and tests.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"            # or "memory"
//! redis_url = "redis://127.0.0.1:6379/0"
//! memory_capacity = 1024
//! ```

mod config;
mod envelope;
mod error;
mod keys;
mod lock;
mod store;

pub use config::{
    CacheBackend, CacheConfig, DEFAULT_MEMORY_CAPACITY, DEFAULT_REDIS_URL, POST_LIST_TTL,
};
pub use envelope::{CACHE_SCHEMA_VERSION, CacheEnvelope};
pub use error::{CacheError, CacheResult};
pub use keys::{KEY_NAMESPACE, post_list_key};
pub use store::{CacheStore, MemoryCacheStore};
