use axum::{
    extract::{Path, State},
    Json,
};

use crate::backend::error::BackendError;
use crate::backend::handlers::publish;
use crate::backend::middleware::{Actor, Origin};
use crate::backend::server::state::{AppState, SharedStore};
use crate::shared::{BroadcastEvent, FollowList, FollowOutcome, FollowStats, UserId};

/// POST /api/users/{id}/follow
pub async fn follow(
    State(state): State<AppState>,
    Path(target): Path<UserId>,
    Actor(actor): Actor,
    origin: Origin,
) -> Result<Json<FollowOutcome>, BackendError> {
    let mut store = state.store.write().await;
    let outcome = store.follow(actor, target)?;
    publish(&state, BroadcastEvent::RelationshipChanged(outcome), origin).await;
    Ok(Json(outcome))
}

/// DELETE /api/users/{id}/follow
pub async fn unfollow(
    State(state): State<AppState>,
    Path(target): Path<UserId>,
    Actor(actor): Actor,
    origin: Origin,
) -> Result<Json<FollowOutcome>, BackendError> {
    let mut store = state.store.write().await;
    let outcome = store.unfollow(actor, target)?;
    publish(&state, BroadcastEvent::RelationshipChanged(outcome), origin).await;
    Ok(Json(outcome))
}

/// GET /api/users/{id}/followers
pub async fn followers(
    State(store): State<SharedStore>,
    Path(id): Path<UserId>,
) -> Result<Json<FollowList>, BackendError> {
    Ok(Json(store.read().await.followers(id)?))
}

/// GET /api/users/{id}/following
pub async fn following(
    State(store): State<SharedStore>,
    Path(id): Path<UserId>,
) -> Result<Json<FollowList>, BackendError> {
    Ok(Json(store.read().await.following(id)?))
}

/// GET /api/users/{id}/follow-stats
pub async fn follow_stats(
    State(store): State<SharedStore>,
    Path(id): Path<UserId>,
) -> Result<Json<FollowStats>, BackendError> {
    Ok(Json(store.read().await.follow_stats(id)?))
}
