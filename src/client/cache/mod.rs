//! Client query cache
//!
//! Keyed, in-memory store of server data the UI renders from. Reads come from
//! here; mutations project onto it optimistically; broadcast events and
//! server responses merge into it.

pub mod key;
pub mod store;
pub mod value;

pub use key::{CacheKey, KeyCollection, KeyPattern, ListScope};
pub use store::{CacheEntry, CacheError, QueryCache, WriteOrigin};
pub use value::{CacheValue, ServerDelta};
