/**
 * Application State Management
 *
 * `AppState` holds the authoritative store and the broadcast channel. The
 * `FromRef` implementations let handlers extract only the part they need.
 *
 * # Thread Safety
 *
 * - `Arc<RwLock<BlogStore>>` serializes all writes through one lock
 * - `broadcast::Sender` is thread-safe and can be cloned
 */

use axum::extract::FromRef;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::backend::realtime::broadcast::RealtimeEventBroadcast;
use crate::backend::store::BlogStore;
use crate::shared::RealtimeEvent;

pub type SharedStore = Arc<RwLock<BlogStore>>;

#[derive(Clone)]
pub struct AppState {
    /// Authoritative posts, users and follow edges
    pub store: SharedStore,

    /// Generic real-time event broadcast channel
    pub realtime_broadcast: RealtimeEventBroadcast,
}

impl AppState {
    /// Empty store with a broadcast channel of `event_capacity`
    pub fn new(event_capacity: usize) -> Self {
        let (realtime_broadcast, _) = broadcast::channel::<RealtimeEvent>(event_capacity);
        Self {
            store: Arc::new(RwLock::new(BlogStore::new())),
            realtime_broadcast,
        }
    }
}

impl FromRef<AppState> for SharedStore {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for RealtimeEventBroadcast {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.realtime_broadcast.clone()
    }
}
