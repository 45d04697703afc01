//! Jazz Cache - a multi-backend cache with automatic fallback
//!
//! One [`CacheManager`] per process selects a backend (memory, file,
//! database, redis, memcached or dynamodb), falling back to the file store
//! and then to memory when the configured one is unavailable. Callers get a
//! typed [`Cache`] handle with set/get/forget and read-through `remember`.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;

pub use api::AppState;
pub use cache::{Cache, CacheManager, CacheStore, Driver};
pub use config::Config;
pub use error::{CacheError, Result};
