/**
 * Real-time Event Broadcasting
 *
 * Events are broadcast using `tokio::sync::broadcast`, a multi-producer,
 * multi-consumer channel. Every subscriber, including the session that
 * caused the change, receives a copy of each event.
 */

use crate::shared::RealtimeEvent;
use tokio::sync::broadcast;

/// Real-time update event broadcast
///
/// Cloned into every handler that mutates the store.
pub type RealtimeEventBroadcast = broadcast::Sender<RealtimeEvent>;

/// Broadcast a real-time event to all subscribers
///
/// # Returns
///
/// Number of active subscribers that received the event (0 if no subscribers)
pub async fn broadcast_event(broadcast_tx: &RealtimeEventBroadcast, event: RealtimeEvent) -> usize {
    let event_type = event.event_type();
    match broadcast_tx.send(event) {
        Ok(subscriber_count) => {
            tracing::info!(
                "[Realtime] {} broadcast to {} subscribers",
                event_type,
                subscriber_count
            );
            subscriber_count
        }
        Err(_) => {
            tracing::debug!("[Realtime] No subscribers to receive {}", event_type);
            0
        }
    }
}
