use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::backend::error::BackendError;
use crate::backend::handlers::publish;
use crate::backend::middleware::{Actor, Origin};
use crate::backend::server::state::{AppState, SharedStore};
use crate::backend::store::PostQuery;
use crate::shared::{BroadcastEvent, Comment, NewPost, Post, PostId, PostPatch};

/// GET /api/posts
pub async fn list_posts(
    State(store): State<SharedStore>,
    Query(query): Query<PostQuery>,
) -> Result<Json<Vec<Post>>, BackendError> {
    Ok(Json(store.read().await.posts(&query)?))
}

/// GET /api/posts/{id}
pub async fn get_post(
    State(store): State<SharedStore>,
    Path(id): Path<PostId>,
) -> Result<Json<Post>, BackendError> {
    Ok(Json(store.read().await.post(id)?.clone()))
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    Actor(actor): Actor,
    origin: Origin,
    Json(draft): Json<NewPost>,
) -> Result<(StatusCode, Json<Post>), BackendError> {
    let mut store = state.store.write().await;
    let post = store.create_post(actor, draft)?;
    publish(&state, BroadcastEvent::post_created(post.clone()), origin).await;
    Ok((StatusCode::CREATED, Json(post)))
}

/// PATCH /api/posts/{id}
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Actor(actor): Actor,
    origin: Origin,
    Json(patch): Json<PostPatch>,
) -> Result<Json<Post>, BackendError> {
    let mut store = state.store.write().await;
    let post = store.update_post(actor, id, &patch)?;
    publish(&state, BroadcastEvent::post_updated(post.clone()), origin).await;
    Ok(Json(post))
}

/// DELETE /api/posts/{id}
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Actor(actor): Actor,
    origin: Origin,
) -> Result<StatusCode, BackendError> {
    let mut store = state.store.write().await;
    store.delete_post(actor, id)?;
    publish(&state, BroadcastEvent::post_deleted(id), origin).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/posts/{id}/like
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Actor(actor): Actor,
    origin: Origin,
) -> Result<Json<Post>, BackendError> {
    let mut store = state.store.write().await;
    let post = store.toggle_like(actor, id)?;
    publish(&state, BroadcastEvent::post_updated(post.clone()), origin).await;
    Ok(Json(post))
}

/// POST /api/posts/{id}/comments
pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Actor(actor): Actor,
    origin: Origin,
    Json(comment): Json<Comment>,
) -> Result<Json<Post>, BackendError> {
    let mut store = state.store.write().await;
    let post = store.add_comment(actor, id, comment)?;
    publish(&state, BroadcastEvent::post_updated(post.clone()), origin).await;
    Ok(Json(post))
}
