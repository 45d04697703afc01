//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use super::error::{ApiError, ApiResult};
use crate::cache::Cache;
use crate::models::{DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse};

/// Application state shared across all handlers.
///
/// `Cache` is a cheap handle; clones share the selected backend.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Handle to the selected cache backend
    pub cache: Cache,
    /// TTL for writes that do not carry one
    pub default_ttl: Duration,
}

impl AppState {
    /// Creates a new AppState around an already selected cache.
    pub fn new(cache: Cache, default_ttl: Duration) -> Self {
        Self { cache, default_ttl }
    }
}

/// Handler for PUT /cache
///
/// Stores any JSON value under a key with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> ApiResult<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let ttl = req
        .ttl
        .map(Duration::from_secs)
        .unwrap_or(state.default_ttl);
    state.cache.set(&req.key, &req.value, ttl).await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /cache/:key
///
/// Retrieves a value from the cache by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<GetResponse>> {
    match state.cache.get::<Value>(&key).await? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(ApiError::NotFound(key)),
    }
}

/// Handler for DELETE /cache/:key
///
/// Deletes a key from the cache; deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    state.cache.forget(&key).await?;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /health
///
/// Reports liveness and the backend in use.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.driver()))
}
