//! Transient user notifications
//!
//! The orchestrator reports failures here; any number of UI surfaces can
//! subscribe. Delivery is best effort: with no subscribers the notification
//! is dropped.

use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

/// How long a notification stays visible unless told otherwise
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(5);

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub ttl: Duration,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
            ttl: DEFAULT_NOTIFICATION_TTL,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
            ttl: DEFAULT_NOTIFICATION_TTL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Returns the number of subscribers that received it
    pub fn notify(&self, notification: Notification) -> usize {
        match self.tx.send(notification) {
            Ok(count) => count,
            Err(broadcast::error::SendError(dropped)) => {
                debug!("[Notify] no subscribers for: {}", dropped.message);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_notifications() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        assert_eq!(notifier.notify(Notification::error("could not save")), 1);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.level, NotificationLevel::Error);
        assert_eq!(received.message, "could not save");
        assert_eq!(received.ttl, DEFAULT_NOTIFICATION_TTL);
    }

    #[test]
    fn test_notify_without_subscribers() {
        let notifier = Notifier::new();
        assert_eq!(notifier.notify(Notification::info("hello")), 0);
    }
}
