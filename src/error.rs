//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror. A missing key is never
//! an error: lookups return `Ok(None)` instead.

use thiserror::Error;

use crate::cache::Driver;

// == Cache Error Enum ==
/// Unified error type for every cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend could not be constructed (unreachable, missing credentials, ...)
    #[error("{driver} cache unavailable: {reason}")]
    Unavailable { driver: Driver, reason: String },

    /// Value could not be encoded to or decoded from JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O, network or protocol failure on an otherwise healthy backend
    #[error("Storage error: {0}")]
    Storage(String),

    /// The producer passed to `remember` failed
    #[error("Producer failed: {0}")]
    Producer(anyhow::Error),

    /// Key rejected before reaching a backend
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl CacheError {
    /// Builds an `Unavailable` error for the given driver.
    pub fn unavailable(driver: Driver, reason: impl ToString) -> Self {
        CacheError::Unavailable {
            driver,
            reason: reason.to_string(),
        }
    }

    /// Builds a `Storage` error with backend context.
    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        CacheError::Storage(format!("{}: {}", context, err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
