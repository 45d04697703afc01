//! In-process memory store.
//!
//! Entries live in a sharded concurrent map. There is no background sweep:
//! expired entries are only removed when a read observes them, so keys that
//! are never read again stay resident.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::cache::{CacheStore, Driver, Entry};
use crate::error::Result;

/// Memory-backed cache store. Construction cannot fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        info!("Initializing memory cache store");
        Self::default()
    }

    /// Number of resident entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn driver(&self) -> Driver {
        Driver::Memory
    }

    async fn put(&self, key: &str, payload: String, ttl: Duration) -> Result<()> {
        self.entries.insert(key.to_string(), Entry::new(payload, ttl));
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>> {
        // Clone out of the shard guard before removing to avoid a deadlock
        let entry = match self.entries.get(key) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };

        if entry.is_expired() {
            // Only drop the entry we saw expire, not a concurrent fresh write
            self.entries.remove_if(key, |_, current| current.is_expired());
            debug!(key = %key, "memory cache entry expired");
            return Ok(None);
        }

        Ok(Some(entry.payload))
    }

    async fn forget(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}
