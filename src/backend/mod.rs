//! Backend Module
//!
//! Reference server for the blogcast client: an authoritative in-memory
//! store, the Mutation API and read endpoints, and real-time fan-out of
//! every change.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Architecture
//!
//! - **`server`** - Server initialization, application state, configuration
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`handlers`** - Post, user and follow handlers
//! - **`store`** - Authoritative store with per-entity versions
//! - **`realtime`** - Event broadcasting and SSE subscription
//! - **`middleware`** - Actor and session extraction
//! - **`error`** - Backend-specific error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - blogcast-server binary
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── handlers/       - Mutation API and reads
//! ├── store.rs        - BlogStore
//! ├── realtime/       - Event broadcasting
//! ├── middleware/     - Request extractors
//! └── error/          - Error types
//! ```
//!
//! # Mutation Contract
//!
//! A successful mutation applies the change, emits exactly one broadcast
//! event describing the new state (or the deleted id), then responds. The
//! event reaches every subscriber, including the session that caused it,
//! and carries that session's id when the request sent `x-session-id`.
//!
//! # Thread Safety
//!
//! - `Arc<RwLock<BlogStore>>` serializes writes
//! - `broadcast::Sender` for fan-out
//!
//! # Example
//!
//! ```rust,no_run
//! use blogcast::backend::server::{create_app, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = create_app(&ServerConfig::default());
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3003").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// HTTP handlers
pub mod handlers;

/// Authoritative store
pub mod store;

/// Real-time update system
pub mod realtime;

/// Backend error types
pub mod error;

/// Request extractors
pub mod middleware;

pub use error::BackendError;
pub use realtime::{broadcast_event, handle_realtime_subscription, RealtimeEventBroadcast};
pub use server::{create_app, AppState, ServerConfig};
pub use store::BlogStore;
