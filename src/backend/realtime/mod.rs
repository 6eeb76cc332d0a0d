//! Real-time Update Module
//!
//! Fans every successful mutation out to all connected clients.
//!
//! # Architecture
//!
//! - **`broadcast`** - Broadcast channel type and the `broadcast_event` helper
//! - **`subscription`** - Server-Sent Events subscription handler
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs          - Module exports and documentation
//! ├── broadcast.rs    - Event broadcasting utilities
//! └── subscription.rs - SSE subscription handler
//! ```
//!
//! # Event Types
//!
//! - `entity-created` - A post or user was created (full entity)
//! - `entity-updated` - A post or user changed (full entity)
//! - `entity-deleted` - A post or user was removed (id only)
//! - `relationship-changed` - A follow or unfollow (counts)

/// Event broadcasting utilities
pub mod broadcast;

/// Server-Sent Events subscription handler
pub mod subscription;

pub use broadcast::{broadcast_event, RealtimeEventBroadcast};
pub use subscription::handle_realtime_subscription;
