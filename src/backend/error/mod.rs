//! Backend Error Module
//!
//! Error types returned by the store and the HTTP handlers.
//!
//! # Architecture
//!
//! - **`types`** - `BackendError` and its status/body mapping
//! - **`conversion`** - `IntoResponse` implementation
//!
//! # HTTP Response Conversion
//!
//! Every error becomes a status code plus a JSON `ApiErrorBody`, the shape
//! the client's `HttpApi` decodes into `ApiError::Rejected`.

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use types::BackendError;
