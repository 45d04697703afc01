//! Redis store.
//!
//! Expiration is delegated to Redis (`SET key value EX ttl`), so a `GET`
//! miss already covers expired keys.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::info;

use super::native_ttl_secs;
use crate::cache::{CacheStore, Driver};
use crate::error::{CacheError, Result};

/// Redis-backed cache store.
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    /// Connects to `url` and verifies the server answers `PING`.
    ///
    /// Gives up after `timeout`; every failure is reported as unavailable.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(CacheError::unavailable(Driver::Redis, "REDIS_URL is not set"));
        }

        let client = Client::open(url).map_err(|e| CacheError::unavailable(Driver::Redis, e))?;

        let connect = async {
            let mut connection = ConnectionManager::new(client).await?;
            redis::cmd("PING")
                .query_async::<()>(&mut connection)
                .await?;
            Ok::<_, redis::RedisError>(connection)
        };

        let connection = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| {
                CacheError::unavailable(Driver::Redis, format!("no answer within {:?}", timeout))
            })?
            .map_err(|e| CacheError::unavailable(Driver::Redis, e))?;

        info!("Connected to Redis cache");
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn driver(&self) -> Driver {
        Driver::Redis
    }

    async fn put(&self, key: &str, payload: String, ttl: Duration) -> Result<()> {
        // Redis refuses EX 0; an already expired entry is just an absent one
        let Some(seconds) = native_ttl_secs(ttl) else {
            return self.forget(key).await;
        };

        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(key, payload, seconds)
            .await
            .map_err(|e| CacheError::storage("redis SET failed", e))
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| CacheError::storage("redis GET failed", e))
    }

    async fn forget(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CacheError::storage("redis DEL failed", e))
    }
}
