//! Broadcast Channel client
//!
//! Subscribes to the server's `/realtime` SSE endpoint and forwards decoded
//! [`RealtimeEvent`]s into an mpsc channel, together with connection state
//! changes. After a drop it reconnects with a fixed delay and reports
//! [`ChannelEvent::Reconnected`], which tells the reconciler that events may
//! have been missed.

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::config::Config;
use crate::shared::config::SESSION_HEADER;
use crate::shared::event::{EventType, RealtimeEvent};

/// What the channel client reports
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// First successful subscription
    Connected,
    /// Subscription re-established after a drop
    Reconnected,
    Disconnected,
    Event(RealtimeEvent),
}

/// One dispatched SSE message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` parser
///
/// Chunks may split lines anywhere; frames are emitted on the blank line
/// that terminates them. Comment lines (`:`) are keep-alives and dropped.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    /// Trailing bytes of a UTF-8 sequence split across chunks
    partial: BytesMut,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the response body
    pub fn feed_bytes(&mut self, chunk: Bytes) -> Vec<SseFrame> {
        self.partial.extend_from_slice(&chunk);
        let valid = match std::str::from_utf8(&self.partial) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                warn!("[Realtime] invalid UTF-8 in SSE stream: {}", e);
                self.partial.clear();
                return Vec::new();
            }
        };
        let complete = self.partial.split_to(valid).freeze();
        let text = String::from_utf8_lossy(&complete).into_owned();
        self.feed(&text)
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(chunk);
        let mut frames = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let line = self.buffer[..newline].trim_end_matches('\r').to_string();
            self.buffer.drain(..=newline);

            if line.is_empty() {
                if !self.data.is_empty() {
                    frames.push(SseFrame {
                        event: self.event.take(),
                        data: self.data.join("\n"),
                    });
                    self.data.clear();
                }
                self.event = None;
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line.as_str(), ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        frames
    }
}

/// Decode a frame into an event; frames with an unknown event name are ignored
pub fn decode_frame(frame: &SseFrame) -> Option<RealtimeEvent> {
    if let Some(name) = &frame.event {
        if EventType::parse(name).is_none() {
            debug!("[Realtime] ignoring frame with event name {}", name);
            return None;
        }
    }
    match serde_json::from_str::<RealtimeEvent>(&frame.data) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("[Realtime] failed to parse event: {} | data: {}", e, frame.data);
            None
        }
    }
}

/// Handle to the background subscription task
pub struct EventChannel {
    task: JoinHandle<()>,
}

impl EventChannel {
    /// Start subscribing; events flow into `tx` until it is closed or the
    /// channel is stopped
    pub fn spawn(config: Config, tx: mpsc::Sender<ChannelEvent>) -> Self {
        let task = tokio::spawn(subscribe_loop(config, tx));
        Self { task }
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn subscribe_loop(config: Config, tx: mpsc::Sender<ChannelEvent>) {
    let client = reqwest::Client::new();
    let url = config.api_url("/realtime");
    let delay = config.reconnect_delay();
    let mut connected_before = false;

    loop {
        info!("[Realtime] Subscribing to SSE: {}", url);
        let response = client
            .get(&url)
            .header("Accept", "text/event-stream")
            .header(SESSION_HEADER, config.session_id().to_string())
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("[Realtime] subscription refused: {} (will retry)", response.status());
                tokio::time::sleep(delay).await;
                continue;
            }
            Err(e) => {
                warn!("[Realtime] failed to subscribe (will retry): {}", e);
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        let status = if connected_before {
            ChannelEvent::Reconnected
        } else {
            ChannelEvent::Connected
        };
        connected_before = true;
        if tx.send(status).await.is_err() {
            return;
        }

        let mut parser = SseParser::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("[Realtime] error reading from SSE stream: {}", e);
                    break;
                }
            };
            for frame in parser.feed_bytes(chunk) {
                if let Some(event) = decode_frame(&frame) {
                    debug!("[Realtime] received {}", event.event_type());
                    if tx.send(ChannelEvent::Event(event)).await.is_err() {
                        return;
                    }
                }
            }
        }

        warn!("[Realtime] stream lost, reconnecting in {:?}", delay);
        if tx.send(ChannelEvent::Disconnected).await.is_err() {
            return;
        }
        tokio::time::sleep(delay).await;
    }
}
