//! Shared Error Types
//!
//! This module defines error types that are shared between the client and the
//! server, plus the structured error body the Mutation API returns.
//!
//! # Error Categories
//!
//! - `SerializationError` - JSON serialization/deserialization failures
//! - `ValidationError` - Data validation failures, with the offending field
//!
//! # Wire format
//!
//! Every non-2xx response from the Mutation API carries an [`ApiErrorBody`]:
//!
//! ```json
//! { "type": "validation", "message": "Missing or invalid title", "field": "title" }
//! ```
//!
//! # Usage
//!
//! ```rust
//! use blogcast::shared::error::SharedError;
//!
//! let error = SharedError::validation("title", "Missing or invalid title");
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shared error types that can occur in both client and server
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

/// Category of a Mutation API error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// Payload rejected (e.g. empty title)
    Validation,
    /// Actor not permitted (e.g. deleting another user's post)
    Authorization,
    /// Entity does not exist
    NotFound,
    /// Request conflicts with current state (e.g. already following)
    Conflict,
    /// Unexpected server failure
    Internal,
}

/// Structured error body `{type, message, field?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "type")]
    pub kind: ApiErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiErrorBody {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl From<SharedError> for ApiErrorBody {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::ValidationError { field, message } => {
                ApiErrorBody::new(ApiErrorKind::Validation, message).with_field(field)
            }
            SharedError::SerializationError { message } => {
                ApiErrorBody::new(ApiErrorKind::Validation, message)
            }
        }
    }
}
