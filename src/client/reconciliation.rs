//! Event Reconciler
//!
//! Folds broadcast events into the local replica. Every event is turned into
//! server deltas per affected key and merged through
//! [`Replica::merge_server`](crate::client::replica::Replica::merge_server),
//! so keys owned by a pending mutation keep their projection.
//!
//! Applying an event twice, or applying the event for a mutation this client
//! already committed, leaves the cache unchanged.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::client::cache::{
    CacheEntry, CacheKey, CacheValue, KeyPattern, ListScope, QueryCache, ServerDelta, WriteOrigin,
};
use crate::client::channel::ChannelEvent;
use crate::client::optimistic::orchestrator::follow_deltas;
use crate::client::replica::{CacheHandle, MergeOutcome};
use crate::shared::entity::{Post, User};
use crate::shared::event::{
    BroadcastEvent, DeletedEntity, EntityPayload, RealtimeEvent, SessionId,
};

/// What one event did to the cache
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Live entries updated
    pub applied: usize,
    /// Deltas folded into pending snapshots instead
    pub deferred: usize,
    /// Live entries marked stale
    pub invalidated: usize,
    /// Deltas that changed nothing
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct EventReconciler {
    cache: CacheHandle,
    session: Option<SessionId>,
}

impl EventReconciler {
    pub fn new(cache: CacheHandle) -> Self {
        Self {
            cache,
            session: None,
        }
    }

    /// Recognize events this session caused
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    pub fn apply(&self, event: &RealtimeEvent) -> ReconcileReport {
        let own = self.session.is_some() && event.origin == self.session;
        let report = self.cache.with(|replica| {
            let mut report = ReconcileReport::default();
            for (key, delta) in deltas_for(&event.event, replica.cache()) {
                if own && already_confirmed(replica.cache().entry(&key), &delta) {
                    report.skipped += 1;
                    continue;
                }
                let invalidation = matches!(delta, ServerDelta::Invalidate);
                match replica.merge_server(key, delta) {
                    MergeOutcome::Applied if invalidation => report.invalidated += 1,
                    MergeOutcome::Applied => report.applied += 1,
                    MergeOutcome::Deferred(_) => report.deferred += 1,
                    MergeOutcome::Unchanged => report.skipped += 1,
                }
            }
            report
        });
        debug!(
            "[Reconciler] {} applied={} deferred={} invalidated={} skipped={}",
            event.event_type(),
            report.applied,
            report.deferred,
            report.invalidated,
            report.skipped
        );
        report
    }

    /// Events may have been missed: every list and aggregate refetches on next read
    pub fn on_reconnect(&self) -> usize {
        let count = self
            .cache
            .with(|replica| replica.invalidate(KeyPattern::AllLists));
        info!("[Reconciler] reconnected; invalidated {} list keys", count);
        count
    }

    pub fn handle(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Event(event) => {
                self.apply(&event);
            }
            ChannelEvent::Reconnected => {
                self.on_reconnect();
            }
            ChannelEvent::Connected => debug!("[Reconciler] channel connected"),
            ChannelEvent::Disconnected => debug!("[Reconciler] channel disconnected"),
        }
    }

    /// Consume channel events until the sender goes away
    pub async fn run(self, mut rx: mpsc::Receiver<ChannelEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event);
        }
        debug!("[Reconciler] channel closed");
    }
}

/// Server deltas an event implies for the keys currently cached
fn deltas_for(event: &BroadcastEvent, cache: &QueryCache) -> Vec<(CacheKey, ServerDelta)> {
    match event {
        BroadcastEvent::EntityCreated(EntityPayload::Post(post)) => {
            let mut deltas = vec![(
                CacheKey::PostDetail(post.id),
                ServerDelta::UpsertPost(post.clone()),
            )];
            for key in cache.keys_matching(KeyPattern::PostLists) {
                if let Some(delta) = created_post_delta(&key, post, cache) {
                    deltas.push((key, delta));
                }
            }
            deltas
        }
        BroadcastEvent::EntityUpdated(EntityPayload::Post(post)) => {
            let mut deltas = vec![(
                CacheKey::PostDetail(post.id),
                ServerDelta::UpsertPost(post.clone()),
            )];
            deltas.extend(
                cache
                    .keys_matching(KeyPattern::PostLists)
                    .into_iter()
                    .filter(|key| cache.read(key).and_then(|v| v.find_post(post.id)).is_some())
                    .map(|key| (key, ServerDelta::UpsertPost(post.clone()))),
            );
            deltas
        }
        BroadcastEvent::EntityCreated(EntityPayload::User(user)) => user_deltas(user, true),
        BroadcastEvent::EntityUpdated(EntityPayload::User(user)) => user_deltas(user, false),
        BroadcastEvent::EntityDeleted(DeletedEntity::Post(id)) => {
            let mut deltas: Vec<_> = cache
                .keys_matching(KeyPattern::PostLists)
                .into_iter()
                .map(|key| (key, ServerDelta::RemovePost(*id)))
                .collect();
            deltas.push((CacheKey::PostDetail(*id), ServerDelta::Invalidate));
            deltas
        }
        BroadcastEvent::EntityDeleted(DeletedEntity::User(id)) => vec![
            (CacheKey::UserList, ServerDelta::Invalidate),
            (CacheKey::UserDetail(*id), ServerDelta::Invalidate),
        ],
        BroadcastEvent::RelationshipChanged(outcome) => follow_deltas(outcome),
    }
}

/// How a newly created post affects one cached post list
fn created_post_delta(key: &CacheKey, post: &Post, cache: &QueryCache) -> Option<ServerDelta> {
    let CacheKey::PostList(scope) = key else {
        return None;
    };
    match scope {
        ListScope::All => Some(ServerDelta::InsertPost(post.clone())),
        ListScope::ByAuthor(author) if *author == post.user.id => {
            Some(ServerDelta::InsertPost(post.clone()))
        }
        ListScope::ByAuthor(_) => None,
        // Nobody's feed holds their own posts
        ListScope::Feed(reader) if *reader == post.user.id => None,
        ListScope::Feed(reader) => {
            // Membership depends on follow edges the event does not carry
            let following = cache
                .entry(&CacheKey::Following(*reader))
                .filter(|entry| !entry.stale)
                .and_then(|entry| entry.value.as_follow_list());
            match following {
                Some(list) if list.contains(post.user.id) => {
                    Some(ServerDelta::InsertPost(post.clone()))
                }
                Some(_) => None,
                None => Some(ServerDelta::Invalidate),
            }
        }
    }
}

fn user_deltas(user: &User, created: bool) -> Vec<(CacheKey, ServerDelta)> {
    let list = if created {
        ServerDelta::InsertUser(user.clone())
    } else {
        ServerDelta::UpsertUser(user.clone())
    };
    vec![
        (CacheKey::UserList, list),
        (CacheKey::UserDetail(user.id), ServerDelta::UpsertUser(user.clone())),
    ]
}

/// A detail entry already holds server data at least as new as the delta
fn already_confirmed(entry: Option<&CacheEntry>, delta: &ServerDelta) -> bool {
    let Some(entry) = entry else {
        return false;
    };
    if entry.stale || entry.written_by != WriteOrigin::ServerConfirmed {
        return false;
    }
    match (&entry.value, delta) {
        (CacheValue::Post(cached), ServerDelta::UpsertPost(incoming)) => {
            cached.id == incoming.id && cached.version >= incoming.version
        }
        (CacheValue::User(cached), ServerDelta::UpsertUser(incoming)) => {
            cached.id == incoming.id && cached.version >= incoming.version
        }
        _ => false,
    }
}
