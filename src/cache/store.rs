//! Cache Store Module
//!
//! The backend contract every storage medium implements, and the typed
//! [`Cache`] handle that owns the JSON serialization boundary and the
//! read-through `remember` logic shared by all backends.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::cache::{Driver, MAX_KEY_LENGTH};
use crate::error::{CacheError, Result};

// == Backend Contract ==
/// Storage operations over serialized payloads.
///
/// Implementations must be safe to call concurrently. `fetch` reports absent
/// and expired keys alike as `Ok(None)`; backends without native TTL purge
/// the expired entry while observing it.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Which backend this is.
    fn driver(&self) -> Driver;

    /// Persists `payload` under `key`, replacing any previous entry.
    async fn put(&self, key: &str, payload: String, ttl: Duration) -> Result<()>;

    /// Returns the live payload for `key`, if any.
    async fn fetch(&self, key: &str) -> Result<Option<String>>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn forget(&self, key: &str) -> Result<()>;
}

// == Cache Handle ==
/// Handle to the active cache backend.
///
/// Cheap to clone; every clone talks to the same backend.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    /// Wraps a backend.
    pub fn new(store: impl CacheStore + 'static) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Wraps an already shared backend.
    pub fn from_arc(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Driver of the wrapped backend.
    pub fn driver(&self) -> Driver {
        self.store.driver()
    }

    // == Set ==
    /// Serializes `value` to JSON and stores it for `ttl`.
    ///
    /// A zero TTL is accepted and produces an entry that is already expired.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        validate_key(key)?;
        let payload = serde_json::to_string(value)?;
        self.store.put(key, payload, ttl).await
    }

    // == Get ==
    /// Retrieves and deserializes the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent or expired.
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        validate_key(key)?;
        match self.store.fetch(key).await? {
            Some(payload) => {
                debug!(key = %key, driver = %self.driver(), "cache hit");
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => {
                debug!(key = %key, driver = %self.driver(), "cache miss");
                Ok(None)
            }
        }
    }

    // == Forget ==
    /// Removes `key`; idempotent.
    pub async fn forget(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.store.forget(key).await
    }

    // == Remember ==
    /// Returns the cached value for `key`, or computes it with `producer`,
    /// caches it for `ttl` and returns it.
    ///
    /// The producer runs at most once per call, on the calling task, with no
    /// timeout. A producer error is returned as [`CacheError::Producer`] and
    /// nothing is cached. A failed cache write after a successful producer is
    /// logged and the produced value is still returned.
    ///
    /// Concurrent misses on the same key are not coalesced: each caller runs
    /// its own producer and writes its own result.
    pub async fn remember<T, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        validate_key(key)?;

        match self.get::<T>(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) => {
                warn!(key = %key, error = %err, "cache read failed, recomputing");
            }
        }

        let value = producer().await.map_err(|err| {
            warn!(key = %key, error = %err, "producer failed, nothing cached");
            CacheError::Producer(err)
        })?;

        if let Err(err) = self.set(key, &value, ttl).await {
            error!(key = %key, error = %err, "failed to cache produced value");
        }

        Ok(value)
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("driver", &self.driver())
            .finish()
    }
}

// == Key Validation ==
/// Rejects keys no backend can store.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
