//! Route Configuration Module
//!
//! # Architecture
//!
//! - **`router`** - Main router creation and layers
//! - **`api_routes`** - Mutation API and read endpoints
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! ├── router.rs       - Main router creation
//! └── api_routes.rs   - API endpoint routes
//! ```
//!
//! # Route Types
//!
//! - `GET /realtime` - Broadcast event subscription (SSE)
//! - `/api/posts/...` - Post reads and mutations
//! - `/api/users/...` - User reads, registration, follows

/// Main router creation
pub mod router;

/// API endpoint routes
pub mod api_routes;

pub use router::create_router;
