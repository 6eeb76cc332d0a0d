/**
 * Blogcast Server Entry Point
 *
 * Serves the Mutation API, the read endpoints and the `/realtime` event
 * stream from one in-memory store.
 */

use blogcast::backend::server::{create_app, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    tracing::info!("[STARTUP] Server initialization started");
    let config = ServerConfig::from_env()?;
    let app = create_app(&config);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[STARTUP] Listening on {}", addr);
    tracing::info!("[STARTUP] Clients should connect to http://127.0.0.1:{}", config.port);
    axum::serve(listener, app).await?;

    Ok(())
}
