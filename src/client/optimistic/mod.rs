//! # Optimistic Mutations
//!
//! Applies user mutations to the query cache immediately, then settles them
//! against the Mutation API.
//!
//! ## Features
//!
//! - **Immediate feedback**: the projected change is visible before the
//!   server answers
//! - **Snapshot rollback**: a failed mutation restores exactly what it
//!   overwrote, all keys or none
//! - **Ordering-safe settlement**: a slow failure never undoes a newer
//!   mutation on the same keys
//! - **Bounded waits**: every server call is cut off by the configured timeout
//!
//! ## Usage
//!
//! ```rust,no_run
//! # async fn demo(orchestrator: blogcast::client::optimistic::MutationOrchestrator<blogcast::client::api::HttpApi>, id: blogcast::shared::PostId) {
//! match orchestrator.toggle_like(id).await {
//!     Ok(post) => println!("{} likes", post.likes),
//!     Err(err) if err.is_retryable() => println!("offline, try again"),
//!     Err(err) => println!("{}", err.user_message()),
//! }
//! # }
//! ```

pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod projection;

pub use error::MutationError;
pub use ledger::{
    DeletedPlacement, MutationKind, MutationLedger, MutationState, MutationTarget,
    PendingMutation, Snapshot,
};
pub use orchestrator::MutationOrchestrator;
