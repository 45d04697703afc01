//! Memcached store over the text protocol.
//!
//! Expiration is native: Memcached reports expired keys as misses. The
//! client is blocking, so every call runs on the blocking thread pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use memcache::MemcacheError;
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::native_ttl_secs;
use crate::cache::entry::unix_now;
use crate::cache::{CacheStore, Driver};
use crate::error::{CacheError, Result};

/// Relative expirations above this many seconds are read by Memcached as
/// absolute Unix timestamps.
const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

/// Key written while connecting; namespaced so it cannot shadow a user key.
const CONNECTION_CHECK_KEY: &str = "jazz-cache:connection-check";

/// Memcached-backed cache store.
pub struct MemcachedStore {
    client: Arc<memcache::Client>,
}

impl MemcachedStore {
    /// Connects to `host:port` and round-trips a check key.
    ///
    /// Gives up after `timeout`; every failure is reported as unavailable.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        if host.trim().is_empty() {
            return Err(CacheError::unavailable(
                Driver::Memcached,
                "MEMCACHED_HOST is not set",
            ));
        }

        let no_answer = || {
            CacheError::unavailable(
                Driver::Memcached,
                format!("no answer from {}:{} within {:?}", host, port, timeout),
            )
        };

        // Fail fast on refused connections before the blocking client retries
        tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| no_answer())?
            .map_err(|e| CacheError::unavailable(Driver::Memcached, e))?;

        let url = format!(
            "memcache://{}:{}?protocol=ascii&timeout={}",
            host,
            port,
            timeout.as_secs().max(1)
        );
        let check = tokio::task::spawn_blocking(move || {
            let client = memcache::Client::connect(url)?;
            client.set(CONNECTION_CHECK_KEY, "ping", 1)?;
            client.get::<String>(CONNECTION_CHECK_KEY)?;
            Ok::<_, MemcacheError>(client)
        });

        let client = tokio::time::timeout(timeout, check)
            .await
            .map_err(|_| no_answer())?
            .map_err(|e| CacheError::unavailable(Driver::Memcached, e))?
            .map_err(|e| CacheError::unavailable(Driver::Memcached, e))?;

        info!("Connected to Memcached at {}:{}", host, port);
        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Runs a client call on the blocking pool.
    async fn blocking<T, F>(&self, context: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&memcache::Client) -> std::result::Result<T, MemcacheError> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || op(&client))
            .await
            .map_err(|e| CacheError::storage(context, e))?
            .map_err(|e| CacheError::storage(context, e))
    }
}

#[async_trait]
impl CacheStore for MemcachedStore {
    fn driver(&self) -> Driver {
        Driver::Memcached
    }

    async fn put(&self, key: &str, payload: String, ttl: Duration) -> Result<()> {
        validate_key(key)?;

        // Expiration 0 means "never" to Memcached
        let Some(seconds) = native_ttl_secs(ttl) else {
            return self.forget(key).await;
        };
        let expiration = expiration_for(seconds, unix_now());

        let key = key.to_string();
        self.blocking("memcached set failed", move |client| {
            client.set(&key, payload.as_str(), expiration)
        })
        .await
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;

        let key_owned = key.to_string();
        let value = self
            .blocking("memcached get failed", move |client| {
                client.get::<String>(&key_owned)
            })
            .await?;

        if value.is_none() {
            debug!(key = %key, "memcached cache miss");
        }
        Ok(value)
    }

    async fn forget(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        let key = key.to_string();
        self.blocking("memcached delete failed", move |client| {
            client.delete(&key).map(|_| ())
        })
        .await
    }
}

/// The text protocol forbids whitespace and control characters in keys.
fn validate_key(key: &str) -> Result<()> {
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CacheError::InvalidKey(format!(
            "memcached keys cannot contain whitespace or control characters: {:?}",
            key
        )));
    }
    Ok(())
}

/// Converts a TTL into Memcached's expiration field.
fn expiration_for(seconds: u64, now: i64) -> u32 {
    let value = if seconds > MAX_RELATIVE_EXPIRATION {
        (now.max(0) as u64).saturating_add(seconds)
    } else {
        seconds
    };
    u32::try_from(value).unwrap_or(u32::MAX)
}
