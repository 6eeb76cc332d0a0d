/**
 * Router Configuration
 *
 * Combines the realtime endpoint and the API routes into one router, then
 * installs request tracing and CORS.
 */

use axum::{http::HeaderValue, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::realtime::subscription::handle_realtime_subscription;
use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::server::config::ServerConfig;
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured
///
/// 1. **Realtime**: `GET /realtime` SSE subscription
/// 2. **API Routes**: posts, users, follows
/// 3. **Fallback Handler**: 404 errors
pub fn create_router(app_state: AppState, config: &ServerConfig) -> Router<()> {
    let router = Router::new().route("/realtime", get(handle_realtime_subscription));

    let router = configure_api_routes(router);

    let router = router.fallback(|| async { (axum::http::StatusCode::NOT_FOUND, "404 Not Found") });

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(config)),
        )
        .with_state(app_state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match config
        .cors_origin
        .as_deref()
        .and_then(|origin| HeaderValue::from_str(origin).ok())
    {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}
