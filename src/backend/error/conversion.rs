/**
 * Error Conversion
 *
 * All backend errors implement `IntoResponse` from Axum, so handlers can
 * return them directly.
 *
 * # Response Format
 *
 * ```json
 * { "type": "validation", "message": "Missing or invalid title", "field": "title" }
 * ```
 */

use axum::{
    response::{IntoResponse, Response},
    Json,
};

use crate::backend::error::types::BackendError;

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("[Api] {}", self);
        } else {
            tracing::debug!("[Api] rejected ({}): {}", status, self);
        }
        (status, Json(self.body())).into_response()
    }
}
