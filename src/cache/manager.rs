//! Cache Manager Module
//!
//! Picks the backend once per process: the configured driver first, then
//! the file store, then the memory store. Selection happens on first use
//! and is never revisited.

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::cache::backends::{
    DatabaseStore, DynamoDbStore, FileStore, MemcachedStore, MemoryStore, RedisStore,
};
use crate::cache::{Cache, Driver};
use crate::config::CacheConfig;
use crate::error::Result;

/// Owns backend selection and hands out the selected [`Cache`].
#[derive(Debug)]
pub struct CacheManager {
    config: CacheConfig,
    cell: OnceCell<Cache>,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Selection ==
    /// Returns the process-wide cache, selecting a backend on first call.
    ///
    /// Concurrent first callers wait on a single selection and all receive
    /// the same backend. Never fails: the memory store is the last resort.
    pub async fn cache(&self) -> Cache {
        self.cell.get_or_init(|| self.select()).await.clone()
    }

    /// Driver chosen by selection, or None before the first [`cache`](Self::cache) call.
    pub fn selected(&self) -> Option<Driver> {
        self.cell.get().map(Cache::driver)
    }

    async fn select(&self) -> Cache {
        for driver in candidates(&self.config.driver) {
            match self.connect(driver).await {
                Ok(cache) => {
                    info!(driver = %driver, "Cache backend selected");
                    return cache;
                }
                Err(err) => {
                    warn!(driver = %driver, error = %err, "Cache backend unavailable, falling back");
                }
            }
        }

        // Unreachable in practice: memory is always the last candidate
        Cache::new(MemoryStore::new())
    }

    // == Construction ==
    /// Builds one specific backend from this manager's configuration.
    pub async fn connect(&self, driver: Driver) -> Result<Cache> {
        let config = &self.config;
        let timeout = config.connect_timeout;

        let cache = match driver {
            Driver::Memory => Cache::new(MemoryStore::new()),
            Driver::File => Cache::new(FileStore::open(&config.file_path).await?),
            Driver::Database => Cache::new(match &config.database_url {
                Some(url) => DatabaseStore::connect(url, &config.database_table, timeout).await?,
                None => DatabaseStore::open(&config.database_path, &config.database_table).await?,
            }),
            Driver::Redis => Cache::new(RedisStore::connect(&config.redis_url, timeout).await?),
            Driver::Memcached => Cache::new(
                MemcachedStore::connect(&config.memcached_host, config.memcached_port, timeout)
                    .await?,
            ),
            Driver::DynamoDb => {
                Cache::new(DynamoDbStore::connect(&config.dynamodb, timeout).await?)
            }
        };
        Ok(cache)
    }
}

/// Drivers to try, in order, for a configured driver name.
pub fn candidates(name: &str) -> Vec<Driver> {
    let mut drivers = Vec::with_capacity(3);

    if name.trim().is_empty() {
        warn!("CACHE_DRIVER is not set, falling back to file cache");
    } else {
        match name.parse::<Driver>() {
            Ok(driver) => drivers.push(driver),
            Err(err) => warn!(error = %err, "falling back to file cache"),
        }
    }

    for fallback in [Driver::File, Driver::Memory] {
        if !drivers.contains(&fallback) {
            drivers.push(fallback);
        }
    }
    drivers
}
