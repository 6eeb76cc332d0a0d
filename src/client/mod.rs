//! Client Replication Module
//!
//! Keeps a client's view of posts, users and follow relationships in sync
//! with the server while showing the user's own changes immediately.
//!
//! # Architecture
//!
//! - **`cache`** - Query cache: keys, values, entries, server deltas
//! - **`replica`** - Cache plus pending-mutation ledger behind one lock
//! - **`optimistic`** - Mutation orchestrator, ledger, projections
//! - **`reconciliation`** - Broadcast event reconciler
//! - **`query`** - Read path with refetch of invalidated keys
//! - **`api`** - Mutation/read API traits and the HTTP client
//! - **`channel`** - SSE broadcast channel client
//! - **`notification`** - Transient user notifications
//! - **`session`** - Per-process wiring of all of the above
//! - **`config`** - Client configuration
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs            - Module exports and documentation
//! ├── cache/            - Query cache
//! ├── replica.rs        - Replica and CacheHandle
//! ├── optimistic/       - Mutation orchestrator
//! ├── reconciliation.rs - Event reconciler
//! ├── query.rs          - Read path
//! ├── api.rs            - API traits and HttpApi
//! ├── channel.rs        - SSE client
//! ├── notification.rs   - Notifier
//! ├── session.rs        - ClientSession
//! └── config.rs         - Config
//! ```

pub mod api;
pub mod cache;
pub mod channel;
pub mod config;
pub mod notification;
pub mod optimistic;
pub mod query;
pub mod reconciliation;
pub mod replica;
pub mod session;

pub use api::{ApiError, HttpApi, MutationApi, ReadApi};
pub use cache::{CacheKey, CacheValue, KeyPattern, ListScope};
pub use channel::{ChannelEvent, EventChannel};
pub use config::Config;
pub use notification::{Notification, NotificationLevel, Notifier};
pub use optimistic::{MutationError, MutationOrchestrator};
pub use query::QueryClient;
pub use reconciliation::{EventReconciler, ReconcileReport};
pub use replica::{CacheHandle, MergeOutcome, Replica, RollbackOutcome};
pub use session::ClientSession;
