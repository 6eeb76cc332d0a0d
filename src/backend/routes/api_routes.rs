/**
 * API Route Configuration
 *
 * Mutation API and read endpoints for posts, users and follows.
 */

use axum::{
    routing::{get, post},
    Router,
};

use crate::backend::handlers::{follows, posts, users};
use crate::backend::server::state::AppState;

/// Configure API routes
///
/// Mutations require the `x-user-id` header, except user registration.
/// Reads are public.
pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        // Posts
        .route("/api/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/api/posts/{id}",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/api/posts/{id}/like", post(posts::toggle_like))
        .route("/api/posts/{id}/comments", post(posts::add_comment))
        // Users
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/users/{id}", get(users::get_user))
        // Follows
        .route(
            "/api/users/{id}/follow",
            post(follows::follow).delete(follows::unfollow),
        )
        .route("/api/users/{id}/followers", get(follows::followers))
        .route("/api/users/{id}/following", get(follows::following))
        .route("/api/users/{id}/follow-stats", get(follows::follow_stats))
}
