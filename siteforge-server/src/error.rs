//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use siteforge_core::Error as CoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Insufficient credits: {requested} requested, {available} available")]
    InsufficientCredits { available: i64, requested: i64 },

    #[error("Subdomain is already taken")]
    SubdomainTaken,

    #[error("Site not found")]
    SiteNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientCredits {
                available,
                requested,
            } => ApiError::InsufficientCredits {
                available,
                requested,
            },
            CoreError::SubdomainTaken => ApiError::SubdomainTaken,
            CoreError::SiteNotFound => ApiError::SiteNotFound,
            CoreError::Validation(msg) => ApiError::Validation(msg),
            CoreError::StorageUnavailable(msg) => ApiError::Storage(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
            ApiError::InsufficientCredits {
                available,
                requested,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                format!(
                    "Insufficient credits: {} requested, {} available",
                    requested, available
                ),
            ),
            ApiError::SubdomainTaken => {
                (StatusCode::CONFLICT, "Subdomain is already taken".to_string())
            }
            ApiError::SiteNotFound => (StatusCode::NOT_FOUND, "Site not found".to_string()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Storage(msg) => {
                // Log the detail, answer with a generic message
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = json!({ "success": false, "reason": message });
        (status, axum::Json(body)).into_response()
    }
}
