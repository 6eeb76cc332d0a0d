/**
 * Real-time Subscription Handler
 *
 * Server-Sent Events stream for the `/realtime` endpoint. Each broadcast
 * event is sent with its event name (`entity-created`, `entity-updated`,
 * `entity-deleted`, `relationship-changed`) and the JSON envelope as data.
 *
 * # Event Filtering
 *
 * Clients can filter events by name using the `types` query parameter:
 * - `?types=entity-deleted,relationship-changed`
 * - No parameter - Subscribe to all event types
 *
 * # Connection Management
 *
 * - Connections are kept alive using the SSE keep-alive mechanism
 * - Lagged events are logged but don't cause connection drops; the client
 *   recovers from a gap only through reconnect invalidation
 */

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::backend::realtime::broadcast::RealtimeEventBroadcast;
use crate::shared::{EventType, RealtimeEvent};

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    /// Comma-separated event names
    pub types: Option<String>,
}

impl SubscriptionQuery {
    /// Requested event types; `None` means all
    pub fn filter(&self) -> Option<Vec<EventType>> {
        self.types
            .as_deref()
            .map(|types| types.split(',').filter_map(EventType::parse).collect::<Vec<_>>())
            .filter(|types| !types.is_empty())
    }
}

/// Handle real-time subscription (GET /realtime)
///
/// # Example Response
///
/// ```http
/// HTTP/1.1 200 OK
/// Content-Type: text/event-stream
///
/// event: entity-updated
/// data: {"event":{"type":"entity-updated","payload":{...}},"origin":"...","timestamp":"..."}
/// ```
pub async fn handle_realtime_subscription(
    State(broadcast_tx): State<RealtimeEventBroadcast>,
    Query(query): Query<SubscriptionQuery>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, axum::Error>>> {
    let filter = query.filter();
    match &filter {
        Some(types) => tracing::info!("[Realtime] Subscription filtered to {:?}", types),
        None => tracing::info!("[Realtime] Subscription to all event types"),
    }

    let stream = stream::unfold(
        (broadcast_tx.subscribe(), filter),
        |(mut rx, filter)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if !wanted(&filter, &event) {
                            continue;
                        }
                        let Some(sse_event) = to_sse(&event) else {
                            continue;
                        };
                        return Some((Ok(sse_event), (rx, filter)));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("[Realtime] Receiver lagged, skipped {} events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("[Realtime] Broadcast channel closed, ending stream");
                        return None;
                    }
                }
            }
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn wanted(filter: &Option<Vec<EventType>>, event: &RealtimeEvent) -> bool {
    filter
        .as_ref()
        .is_none_or(|types| types.contains(&event.event_type()))
}

fn to_sse(event: &RealtimeEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(data) => {
            tracing::debug!("[Realtime] Sending {} to subscriber", event.event_type());
            Some(Event::default().event(event.event_type().as_str()).data(data))
        }
        Err(e) => {
            tracing::error!("[Realtime] Failed to serialize event: {:?}", e);
            None
        }
    }
}
