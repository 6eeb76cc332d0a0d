//! Blogcast - Main Library
//!
//! Blogcast is the replication layer of a social blogging app: posts, likes,
//! comments and follow relationships shown instantly on the acting client
//! and kept converged with the server on every other client.
//!
//! # Overview
//!
//! This library provides:
//! - A client query cache keyed by query identity
//! - Optimistic mutations with snapshot rollback and a pending-mutation ledger
//! - An event reconciler that merges server broadcasts into the cache
//! - A reference server (in-memory store, Mutation API, SSE fan-out)
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared between client and server
//!   - Entities, broadcast events, error bodies, configuration
//!
//! - **`client`** - Client replication core
//!   - Query cache, mutation orchestrator, event reconciler
//!   - HTTP and SSE clients, notifications, session wiring
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Axum HTTP server with the Mutation API and read endpoints
//!   - Authoritative in-memory store and real-time broadcasting
//!
//! # Feature Flags
//!
//! - **`ssr`** - Enables the backend module and the `blogcast-server` binary
//!
//! # Usage
//!
//! ## Server-Side
//!
//! ```rust,ignore
//! use blogcast::backend::server::{config::ServerConfig, init::create_app};
//!
//! # async fn example() {
//! let app = create_app(&ServerConfig::default());
//! // Use app with axum::serve
//! # }
//! ```
//!
//! ## Client-Side
//!
//! ```rust,no_run
//! use blogcast::client::{ClientSession, Config};
//! use blogcast::shared::NewPost;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = ClientSession::connect(Config::load()?)?;
//! let (_channel, _reconciler) = session.start_realtime();
//! session.mutations().create_post(NewPost::titled("Hello")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! - **Server**: the store sits behind one `RwLock`; events go out on a `broadcast::Sender`
//! - **Client**: cache and ledger share one `Mutex`; every cache step runs to
//!   completion under it and network calls happen outside it
//!
//! # Error Handling
//!
//! - `Result<T, E>` for fallible operations
//! - Custom error types in `shared::error`, `client::optimistic::error`,
//!   `client::api` and `backend::error`

/// Shared types and data structures
pub mod shared;

/// Client replication core
pub mod client;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;

#[cfg(test)]
pub(crate) mod testing;
