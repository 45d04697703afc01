//! Cache Module
//!
//! Multi-backend caching with per-entry TTL. A [`CacheManager`] selects one
//! backend per process (configured driver, then file, then memory) and hands
//! out a typed [`Cache`] handle with set/get/forget/remember.

pub mod backends;
mod driver;
pub(crate) mod entry;
mod manager;
mod store;


// Re-export public types
pub use backends::{
    DatabaseStore, DynamoDbStore, FileStore, MemcachedStore, MemoryStore, RedisStore,
};
pub use driver::{Driver, UnknownDriver};
pub use entry::Entry;
pub use manager::{candidates, CacheManager};
pub use store::{Cache, CacheStore};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 250;
