//! HTTP error mapping
//!
//! Wraps [`CacheError`] for the demo server and turns it into JSON error
//! responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::error::CacheError;
use crate::models::ErrorResponse;

// == API Error Enum ==
/// Errors a handler can return.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Key absent or expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Request body failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failure reported by the cache layer
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ApiError {
    /// Status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Cache(err) => match err {
                CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
                CacheError::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CacheError::Storage(_) => StatusCode::BAD_GATEWAY,
                CacheError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                CacheError::Producer(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
