/**
 * Request Actor Extraction
 *
 * The acting user travels in the `x-user-id` header as a trusted
 * development identity. The originating client session travels in
 * `x-session-id` and is echoed into the broadcast envelope.
 */

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::shared::config::{ACTOR_HEADER, SESSION_HEADER};
use crate::shared::{SessionId, UserId};

/// Acting user of a mutation request
///
/// Rejects with 401 if the header is missing or not a UUID. Whether the
/// user exists is checked by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = header(parts, ACTOR_HEADER).ok_or_else(|| {
            tracing::warn!("[Api] {} header missing", ACTOR_HEADER);
            BackendError::Unauthenticated(format!("missing {} header", ACTOR_HEADER))
        })?;
        Uuid::parse_str(raw)
            .map(|id| Actor(UserId(id)))
            .map_err(|_| BackendError::Unauthenticated(format!("invalid {} header", ACTOR_HEADER)))
    }
}

/// Client session that sent the request, if it said so
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Origin(pub Option<SessionId>);

impl<S: Send + Sync> FromRequestParts<S> for Origin {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = header(parts, SESSION_HEADER)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(SessionId);
        Ok(Origin(session))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}
