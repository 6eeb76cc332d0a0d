/**
 * Backend Error Types
 *
 * This module defines error types specific to the backend server.
 * These errors are returned by the store and the HTTP handlers and are
 * converted to HTTP responses carrying an `ApiErrorBody`.
 *
 * # Error Categories
 *
 * - Validation - the payload is rejected (empty title, self-follow)
 * - Unauthenticated / Forbidden - no acting user, or not the owner
 * - NotFound - the entity does not exist
 * - Conflict - the request contradicts current state (already following)
 * - State - unexpected server failure
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::shared::{ApiErrorBody, ApiErrorKind, SharedError};

/// Backend-specific error types
///
/// # Usage
///
/// ```rust,ignore
/// use blogcast::backend::error::BackendError;
///
/// let err = BackendError::not_found("post");
/// assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// The payload failed validation
    #[error("Validation error in field '{field}': {message}")]
    Validation { field: String, message: String },

    /// No acting user, or the acting user is unknown
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The acting user may not touch this entity
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// State management error (e.g., poisoned lock)
    #[error("State error: {message}")]
    StateError { message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BackendError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::StateError {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `Validation` - 400 Bad Request
    /// - `Unauthenticated` - 401 Unauthorized
    /// - `Forbidden` - 403 Forbidden
    /// - `NotFound` - 404 Not Found
    /// - `Conflict` - 409 Conflict
    /// - `StateError`, `SerializationError` - 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::StateError { .. } | Self::SerializationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Validation { .. } => ApiErrorKind::Validation,
            Self::Unauthenticated(_) | Self::Forbidden(_) => ApiErrorKind::Authorization,
            Self::NotFound(_) => ApiErrorKind::NotFound,
            Self::Conflict(_) => ApiErrorKind::Conflict,
            Self::StateError { .. } | Self::SerializationError(_) => ApiErrorKind::Internal,
        }
    }

    /// Structured `{type, message, field?}` body for the response
    pub fn body(&self) -> ApiErrorBody {
        match self {
            Self::Validation { field, message } => {
                ApiErrorBody::new(ApiErrorKind::Validation, message.clone()).with_field(field.clone())
            }
            Self::Unauthenticated(message)
            | Self::Forbidden(message)
            | Self::Conflict(message) => ApiErrorBody::new(self.kind(), message.clone()),
            Self::NotFound(_) => ApiErrorBody::new(ApiErrorKind::NotFound, self.to_string()),
            // Internal details stay in the log
            Self::StateError { .. } | Self::SerializationError(_) => {
                ApiErrorBody::new(ApiErrorKind::Internal, "internal server error")
            }
        }
    }
}

impl From<SharedError> for BackendError {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::ValidationError { field, message } => Self::Validation { field, message },
            SharedError::SerializationError { message } => Self::validation("body", message),
        }
    }
}
