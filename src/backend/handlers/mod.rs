//! Mutation API and Read Handlers
//!
//! Every successful mutation applies its change to the store, broadcasts
//! exactly one event, and only then responds. The broadcast happens while
//! the store's write lock is still held, so events for one entity leave the
//! server in version order.
//!
//! # Routes
//!
//! ## Posts
//! - `GET /api/posts[?author=|?feed=]`, `POST /api/posts`
//! - `GET|PATCH|DELETE /api/posts/{id}`
//! - `POST /api/posts/{id}/like`, `POST /api/posts/{id}/comments`
//!
//! ## Users
//! - `GET|POST /api/users`, `GET /api/users/{id}`
//!
//! ## Follows
//! - `POST|DELETE /api/users/{id}/follow`
//! - `GET /api/users/{id}/followers`, `/following`, `/follow-stats`

pub mod follows;
pub mod posts;
pub mod users;

use crate::backend::middleware::Origin;
use crate::backend::realtime::broadcast_event;
use crate::backend::server::state::AppState;
use crate::shared::{BroadcastEvent, RealtimeEvent};

/// Fan `event` out, tagged with the session that caused it
async fn publish(state: &AppState, event: BroadcastEvent, Origin(origin): Origin) -> usize {
    broadcast_event(
        &state.realtime_broadcast,
        RealtimeEvent::new(event).with_origin(origin),
    )
    .await
}
