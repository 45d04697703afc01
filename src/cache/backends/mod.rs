//! Cache Backends
//!
//! One [`CacheStore`](crate::cache::CacheStore) implementation per storage
//! medium. Memory and file stores need no external service; the others
//! verify connectivity while being constructed.

mod database;
mod dynamodb;
mod file;
mod memcached;
mod memory;
mod redis;

pub use database::DatabaseStore;
pub use dynamodb::DynamoDbStore;
pub use file::FileStore;
pub use memcached::MemcachedStore;
pub use memory::MemoryStore;
pub use redis::RedisStore;

use std::time::Duration;

use crate::cache::entry::ceil_secs;

/// Whole seconds for servers that expire keys natively.
///
/// Sub-second remainders round up so a live entry is never cut short.
/// Returns None for a zero TTL, which those servers would read as "never".
pub(crate) fn native_ttl_secs(ttl: Duration) -> Option<u64> {
    match ceil_secs(ttl) {
        0 => None,
        secs => Some(secs),
    }
}
