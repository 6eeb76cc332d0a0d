/**
 * Server Initialization
 *
 * Builds the application state and the router.
 */

use axum::Router;

use crate::backend::routes::router::create_router;
use crate::backend::server::config::ServerConfig;
use crate::backend::server::state::AppState;

/// Create and configure the Axum application
///
/// 1. **Create State**: empty store and a broadcast channel sized from config
/// 2. **Create Router**: API routes, `/realtime`, trace and CORS layers
pub fn create_app(config: &ServerConfig) -> Router<()> {
    tracing::info!("Initializing blogcast backend server");
    let app_state = AppState::new(config.event_capacity);
    tracing::info!(
        "Store and broadcast channel initialized (capacity {})",
        config.event_capacity
    );
    create_router(app_state, config)
}
