use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::backend::error::BackendError;
use crate::backend::handlers::publish;
use crate::backend::middleware::Origin;
use crate::backend::server::state::{AppState, SharedStore};
use crate::shared::{BroadcastEvent, EntityPayload, NewUser, User, UserId};

/// GET /api/users
pub async fn list_users(State(store): State<SharedStore>) -> Json<Vec<User>> {
    Json(store.read().await.users())
}

/// GET /api/users/{id}
pub async fn get_user(
    State(store): State<SharedStore>,
    Path(id): Path<UserId>,
) -> Result<Json<User>, BackendError> {
    Ok(Json(store.read().await.user(id)?.clone()))
}

/// POST /api/users
///
/// Registration needs no acting user.
pub async fn create_user(
    State(state): State<AppState>,
    origin: Origin,
    Json(new_user): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), BackendError> {
    let mut store = state.store.write().await;
    let user = store.create_user(new_user)?;
    publish(
        &state,
        BroadcastEvent::EntityCreated(EntityPayload::User(user.clone())),
        origin,
    )
    .await;
    Ok((StatusCode::CREATED, Json(user)))
}
