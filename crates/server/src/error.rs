//! Unified error handling for the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::integrations::AdapterError;
use crate::oauth::OAuthError;
use crate::storage::StorageError;
use crate::sync::SyncError;

/// Application-level error type for route handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A platform/carrier API operation failed.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// An OAuth flow failed.
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// A sync run failed before producing a report.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated or a signature check failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Storage(_) | Self::Internal(_) | Self::Adapter(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Adapter(_) => StatusCode::BAD_GATEWAY,
            Self::OAuth(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Sync(SyncError::AlreadyRunning) => StatusCode::CONFLICT,
            Self::Sync(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Storage(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Adapter(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}
