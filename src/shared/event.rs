/**
 * Broadcast Event System
 *
 * This module defines the events the server fans out to every connected
 * client after a successful mutation. Each event is a tagged variant per
 * entity kind, so a consumer that forgets a case fails to compile instead
 * of silently ignoring it.
 *
 * Events travel inside a [`RealtimeEvent`] envelope that adds a timestamp
 * and, optionally, the session that caused the change.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::shared::entity::{EntityKind, FollowOutcome, Post, PostId, User, UserId};

/// Identifier of one client session (one connected tab or process)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Name of a broadcast event, used as the SSE event name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    EntityCreated,
    EntityUpdated,
    EntityDeleted,
    RelationshipChanged,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityCreated => "entity-created",
            Self::EntityUpdated => "entity-updated",
            Self::EntityDeleted => "entity-deleted",
            Self::RelationshipChanged => "relationship-changed",
        }
    }

    /// Parse an event name, ignoring case and surrounding whitespace
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "entity-created" => Some(Self::EntityCreated),
            "entity-updated" => Some(Self::EntityUpdated),
            "entity-deleted" => Some(Self::EntityDeleted),
            "relationship-changed" => Some(Self::RelationshipChanged),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full entity carried by created/updated events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EntityPayload {
    Post(Post),
    User(User),
}

impl EntityPayload {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Post(_) => EntityKind::Post,
            Self::User(_) => EntityKind::User,
        }
    }
}

/// Id carried by deletion events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DeletedEntity {
    Post(PostId),
    User(UserId),
}

/// A server-authoritative change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum BroadcastEvent {
    EntityCreated(EntityPayload),
    EntityUpdated(EntityPayload),
    EntityDeleted(DeletedEntity),
    RelationshipChanged(FollowOutcome),
}

impl BroadcastEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::EntityCreated(_) => EventType::EntityCreated,
            Self::EntityUpdated(_) => EventType::EntityUpdated,
            Self::EntityDeleted(_) => EventType::EntityDeleted,
            Self::RelationshipChanged(_) => EventType::RelationshipChanged,
        }
    }

    pub fn post_created(post: Post) -> Self {
        Self::EntityCreated(EntityPayload::Post(post))
    }

    pub fn post_updated(post: Post) -> Self {
        Self::EntityUpdated(EntityPayload::Post(post))
    }

    pub fn post_deleted(id: PostId) -> Self {
        Self::EntityDeleted(DeletedEntity::Post(id))
    }
}

/// Envelope delivered over the broadcast channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub event: BroadcastEvent,
    /// Session whose mutation produced the event, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<SessionId>,
    pub timestamp: DateTime<Utc>,
}

impl RealtimeEvent {
    pub fn new(event: BroadcastEvent) -> Self {
        Self {
            event,
            origin: None,
            timestamp: Utc::now(),
        }
    }

    /// Tag the event with the originating session
    pub fn with_origin(mut self, origin: Option<SessionId>) -> Self {
        self.origin = origin;
        self
    }

    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }
}
