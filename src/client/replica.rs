//! Local replica: the query cache plus the ledger of pending mutations
//!
//! Every change to client-side server state goes through [`Replica`], so the
//! ownership rules between optimistic projections and server data live in
//! one place:
//!
//! - A key is *owned* by the newest pending mutation that projected onto it
//!   (its `touched_seq`).
//! - Server data for an owned key never overwrites the projection. It is
//!   folded into the snapshots of the pending mutations covering the key, so
//!   a later rollback restores a value that already includes it.
//! - A mutation that is no longer the newest toucher of some key is
//!   *superseded*: its rollback leaves the live cache alone and hands its
//!   captured entries down to the next pending mutation on those keys.
//!
//! [`CacheHandle`] shares one replica between the orchestrator, the
//! reconciler and the read path.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, trace};

use crate::client::cache::{
    CacheError, CacheKey, CacheValue, KeyPattern, QueryCache, ServerDelta,
};
use crate::client::optimistic::ledger::{
    DeletedPlacement, MutationKind, MutationLedger, MutationState, MutationTarget,
    PendingMutation, Snapshot,
};

/// How a rollback ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Every snapshotted key was restored
    Restored,
    /// A newer mutation owns at least one key; nothing was restored
    Superseded { keys: Vec<CacheKey> },
    /// The sequence number is not pending
    Unknown,
}

/// Where a server delta ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Written to the live cache
    Applied,
    /// Folded into the snapshots of this many pending mutations
    Deferred(usize),
    /// Nothing changed (absent from lists, or older than the cached copy)
    Unchanged,
}

#[derive(Debug, Default)]
pub struct Replica {
    cache: QueryCache,
    ledger: MutationLedger,
}

impl Replica {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn ledger(&self) -> &MutationLedger {
        &self.ledger
    }

    pub fn read(&self, key: &CacheKey) -> Option<&CacheValue> {
        self.cache.read(key)
    }

    pub fn invalidate(&mut self, pattern: KeyPattern) -> usize {
        self.cache.invalidate(pattern)
    }

    /// Pending mutation that currently owns `key`, if any
    pub fn owner_of(&self, key: &CacheKey) -> Option<u64> {
        self.cache
            .touched_seq(key)
            .filter(|seq| self.ledger.is_pending(*seq))
    }

    /// Snapshot `keys` and register a new pending mutation
    pub fn begin(&mut self, kind: MutationKind, target: MutationTarget, keys: &[CacheKey]) -> u64 {
        let seq = self.ledger.next_seq();
        let snapshot = Snapshot::capture(&self.cache, keys);
        debug!(
            "[Optimistic] {} seq {} snapshotted {} keys",
            kind,
            seq,
            snapshot.keys().count()
        );
        self.ledger
            .register(PendingMutation::new(seq, kind, target, snapshot));
        seq
    }

    /// Project the effect of pending mutation `seq` onto `key`
    ///
    /// The key must have been snapshotted by [`begin`](Self::begin).
    pub fn project(
        &mut self,
        seq: u64,
        key: CacheKey,
        f: impl FnOnce(Option<&CacheValue>) -> Option<CacheValue>,
    ) -> Result<bool, CacheError> {
        self.cache.transform_optimistic(key, seq, f)
    }

    pub fn advance(&mut self, seq: u64, state: MutationState) {
        if let Some(mutation) = self.ledger.get_mut(seq) {
            trace!("[Optimistic] seq {} {:?} -> {:?}", seq, mutation.state, state);
            mutation.state = state;
        }
    }

    pub fn record_placement(&mut self, seq: u64, placement: DeletedPlacement) {
        if let Some(mutation) = self.ledger.get_mut(seq) {
            mutation.placement = Some(placement);
        }
    }

    /// Settle `seq` successfully, writing the server's result
    ///
    /// For each key: if `seq` is still its newest toucher the delta goes to
    /// the live cache. Otherwise it is treated like any other server data:
    /// folded into the snapshots of the mutations still pending on the key,
    /// or merged live (version-checked) once none are.
    pub fn commit(&mut self, seq: u64, deltas: Vec<(CacheKey, ServerDelta)>) {
        match self.ledger.take(seq) {
            Some(mutation) => debug!(
                "[Optimistic] {} seq {} on {} confirmed after {:?}",
                mutation.kind,
                seq,
                mutation.target,
                mutation.started_at.elapsed()
            ),
            None => debug!("[Optimistic] commit for unknown seq {}", seq),
        }
        for (key, delta) in deltas {
            let owned = self.cache.touched_seq(&key) == Some(seq);
            if let ServerDelta::Invalidate = delta {
                self.cache.invalidate(KeyPattern::Exact(key));
            } else if owned {
                self.cache.merge(key, &delta);
            } else {
                let outcome = self.merge_server(key, delta);
                trace!("[Optimistic] seq {} no longer owns {}: {:?}", seq, key, outcome);
                continue;
            }
            if owned {
                self.cache.confirm(&key);
            }
        }
    }

    /// Settle `seq` unsuccessfully
    ///
    /// Restores every snapshotted key only if `seq` still owns all of them.
    /// Otherwise the live cache is left untouched: captured entries go to the
    /// next pending mutation on each key, and keys nobody newer covers are
    /// invalidated so the next read refetches them.
    pub fn rollback(&mut self, seq: u64) -> RollbackOutcome {
        let Some(mutation) = self.ledger.take(seq) else {
            return RollbackOutcome::Unknown;
        };

        let superseded: Vec<CacheKey> = mutation
            .snapshot
            .keys()
            .filter(|key| {
                self.cache
                    .touched_seq(key)
                    .is_some_and(|touched| touched > seq)
            })
            .copied()
            .collect();

        if superseded.is_empty() {
            for (key, entry) in mutation.snapshot.into_entries() {
                self.cache.restore(key, entry);
            }
            if let Some(placement) = mutation.placement {
                self.reinsert(placement);
            }
            info!(
                "[Optimistic] {} seq {} on {} rolled back after {:?}",
                mutation.kind,
                seq,
                mutation.target,
                mutation.started_at.elapsed()
            );
            return RollbackOutcome::Restored;
        }

        for (key, entry) in mutation.snapshot.into_entries() {
            match self.ledger.next_touching(seq, &key) {
                Some(next) => {
                    if let Some(newer) = self.ledger.get_mut(next) {
                        newer.snapshot.replace(&key, entry);
                    }
                }
                None if self.cache.touched_seq(&key) == Some(seq) => {
                    self.cache.invalidate(KeyPattern::Exact(key));
                }
                None => {}
            }
        }
        info!(
            "[Optimistic] {} seq {} on {} superseded on {} keys; rollback skipped",
            mutation.kind,
            seq,
            mutation.target,
            superseded.len()
        );
        RollbackOutcome::Superseded { keys: superseded }
    }

    /// Merge server data that did not come from one of our mutations
    ///
    /// Owned keys keep their projection; the data is folded into the pending
    /// snapshots covering the key. A full value for an owned key still clears
    /// the live stale flag so the read path does not refetch in a loop.
    pub fn merge_server(&mut self, key: CacheKey, delta: ServerDelta) -> MergeOutcome {
        if let ServerDelta::Invalidate = delta {
            return if self.cache.invalidate(KeyPattern::Exact(key)) > 0 {
                MergeOutcome::Applied
            } else {
                MergeOutcome::Unchanged
            };
        }

        if self.owner_of(&key).is_some() {
            let folded = self
                .ledger
                .snapshots_touching(0, &key)
                .map(|snapshot| snapshot.merge(&key, &delta))
                .filter(|changed| *changed)
                .count();
            if delta.refreshes() {
                self.cache.mark_fresh(&key);
            }
            trace!("[Optimistic] {} owned; folded into {} snapshots", key, folded);
            return MergeOutcome::Deferred(folded);
        }

        if self.cache.merge(key, &delta) {
            MergeOutcome::Applied
        } else {
            MergeOutcome::Unchanged
        }
    }

    /// Drop a key the server no longer knows, unless a pending mutation owns it
    pub fn evict(&mut self, key: &CacheKey) -> bool {
        if self.owner_of(key).is_some() {
            return false;
        }
        let existed = self.cache.entry(key).is_some();
        self.cache.restore(*key, None);
        existed
    }

    /// Put a deleted post back in the lists it was removed from
    fn reinsert(&mut self, placement: DeletedPlacement) {
        let DeletedPlacement { post, positions } = placement;
        for (key, index) in positions {
            self.cache.transform(key, |current| {
                let posts = current?.as_posts()?;
                if posts.iter().any(|p| p.id == post.id) {
                    return None;
                }
                let mut posts = posts.to_vec();
                let index = if index <= posts.len() { index } else { 0 };
                posts.insert(index, post.clone());
                Some(CacheValue::Posts(posts))
            });
        }
    }
}

/// Shared, thread-safe handle to a [`Replica`]
///
/// The lock is only ever held inside [`with`](Self::with), never across an
/// await point.
#[derive(Debug, Clone, Default)]
pub struct CacheHandle {
    inner: Arc<Mutex<Replica>>,
}

impl CacheHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Replica) -> R) -> R {
        let mut replica = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut replica)
    }

    /// Clone of the current value for `key`
    pub fn read(&self, key: &CacheKey) -> Option<CacheValue> {
        self.with(|replica| replica.read(key).cloned())
    }

    /// Seed the cache with server data, as the read path does
    pub fn seed(&self, key: CacheKey, value: CacheValue) {
        self.with(|replica| replica.merge_server(key, ServerDelta::Replace(value)));
    }

    pub fn pending_count(&self) -> usize {
        self.with(|replica| replica.ledger().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::cache::{ListScope, WriteOrigin};
    use crate::shared::entity::{Post, UserId};
    use crate::testing::{post_by, user_named};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    const ALL: CacheKey = CacheKey::PostList(ListScope::All);

    fn seeded(post: &Post) -> Replica {
        let mut replica = Replica::new();
        replica.merge_server(ALL, ServerDelta::Replace(CacheValue::Posts(vec![post.clone()])));
        replica.merge_server(
            CacheKey::PostDetail(post.id),
            ServerDelta::Replace(CacheValue::Post(post.clone())),
        );
        replica
    }

    fn like(replica: &mut Replica, post: &Post, user: UserId) -> u64 {
        let keys = [ALL, CacheKey::PostDetail(post.id)];
        let seq = replica.begin(MutationKind::ToggleLike, MutationTarget::Post(post.id), &keys);
        for key in keys {
            replica
                .project(seq, key, |current| {
                    current?.map_post(post.id, |p| {
                        p.toggle_like(user);
                    })
                })
                .unwrap();
        }
        seq
    }

    fn likes(replica: &Replica, post: &Post) -> u64 {
        replica
            .read(&CacheKey::PostDetail(post.id))
            .and_then(|v| v.as_post())
            .map(|p| p.likes)
            .unwrap()
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let author = user_named("alice");
        let post = post_by(&author, "hello");
        let mut replica = seeded(&post);
        let before = replica.cache().entry(&ALL).cloned();

        let seq = like(&mut replica, &post, UserId::new());
        assert_eq!(likes(&replica, &post), 1);

        assert_eq!(replica.rollback(seq), RollbackOutcome::Restored);
        assert_eq!(replica.cache().entry(&ALL).cloned(), before);
        assert_eq!(likes(&replica, &post), 0);
        assert!(replica.ledger().is_empty());
    }

    #[test]
    fn test_superseded_rollback_is_skipped() {
        let author = user_named("alice");
        let post = post_by(&author, "hello");
        let mut replica = seeded(&post);
        let bob = UserId::new();

        let first = like(&mut replica, &post, bob);
        let second = like(&mut replica, &post, bob);
        assert_eq!(likes(&replica, &post), 0);

        assert_matches!(replica.rollback(first), RollbackOutcome::Superseded { keys } if keys.len() == 2);
        // Live value still shows the second toggle
        assert_eq!(likes(&replica, &post), 0);

        // The second rollback restores the state from before the first
        assert_eq!(replica.rollback(second), RollbackOutcome::Restored);
        assert_eq!(likes(&replica, &post), 0);
        assert_eq!(
            replica.cache().entry(&ALL).map(|e| e.touched_seq),
            Some(None)
        );
    }

    #[test]
    fn test_rollback_in_reverse_order_restores_original() {
        let author = user_named("alice");
        let post = post_by(&author, "hello");
        let mut replica = seeded(&post);
        let bob = UserId::new();

        let first = like(&mut replica, &post, bob);
        let second = like(&mut replica, &post, bob);

        assert_eq!(replica.rollback(second), RollbackOutcome::Restored);
        assert_eq!(likes(&replica, &post), 1);
        assert_eq!(replica.rollback(first), RollbackOutcome::Restored);
        assert_eq!(likes(&replica, &post), 0);
    }

    #[test]
    fn test_commit_writes_server_value() {
        let author = user_named("alice");
        let post = post_by(&author, "hello");
        let mut replica = seeded(&post);
        let bob = UserId::new();

        let seq = like(&mut replica, &post, bob);
        let mut confirmed = post.clone();
        confirmed.toggle_like(bob);
        confirmed.version += 1;

        replica.commit(
            seq,
            vec![
                (ALL, ServerDelta::UpsertPost(confirmed.clone())),
                (CacheKey::PostDetail(post.id), ServerDelta::UpsertPost(confirmed.clone())),
            ],
        );

        let entry = replica.cache().entry(&CacheKey::PostDetail(post.id)).unwrap();
        assert_eq!(entry.value, CacheValue::Post(confirmed));
        assert_eq!(entry.written_by, WriteOrigin::ServerConfirmed);
        assert!(replica.ledger().is_empty());
    }

    #[test]
    fn test_superseded_commit_feeds_newer_snapshot() {
        let author = user_named("alice");
        let post = post_by(&author, "hello");
        let mut replica = seeded(&post);
        let bob = UserId::new();

        let first = like(&mut replica, &post, bob);
        let second = like(&mut replica, &post, bob);

        let mut confirmed = post.clone();
        confirmed.toggle_like(bob);
        confirmed.version += 1;
        replica.commit(
            first,
            vec![(CacheKey::PostDetail(post.id), ServerDelta::UpsertPost(confirmed))],
        );
        // Still showing the second toggle
        assert_eq!(likes(&replica, &post), 0);

        // If the second fails, the first's confirmed like comes back
        assert_eq!(replica.rollback(second), RollbackOutcome::Restored);
        assert_eq!(likes(&replica, &post), 1);
    }

    #[test]
    fn test_server_data_on_owned_key_is_deferred() {
        let author = user_named("alice");
        let post = post_by(&author, "hello");
        let mut replica = seeded(&post);
        let seq = like(&mut replica, &post, UserId::new());

        let mut retitled = post.clone();
        retitled.title = "edited elsewhere".to_string();
        retitled.version += 1;
        let outcome = replica.merge_server(
            CacheKey::PostDetail(post.id),
            ServerDelta::UpsertPost(retitled.clone()),
        );
        assert_eq!(outcome, MergeOutcome::Deferred(1));
        assert_eq!(likes(&replica, &post), 1);

        replica.rollback(seq);
        assert_eq!(
            replica.read(&CacheKey::PostDetail(post.id)),
            Some(&CacheValue::Post(retitled))
        );
    }

    #[test]
    fn test_late_refetch_does_not_undo_a_commit() {
        let author = user_named("alice");
        let post = post_by(&author, "hello");
        let mut replica = seeded(&post);
        let detail = CacheKey::PostDetail(post.id);

        let liker = UserId::new();
        let seq = like(&mut replica, &post, liker);
        let mut confirmed = post.clone();
        confirmed.toggle_like(liker);
        confirmed.version = 2;
        replica.commit(
            seq,
            vec![
                (ALL, ServerDelta::UpsertPost(confirmed.clone())),
                (detail, ServerDelta::UpsertPost(confirmed.clone())),
            ],
        );

        // Read responses sent before the like landed
        let detail_outcome =
            replica.merge_server(detail, ServerDelta::Replace(CacheValue::Post(post.clone())));
        replica.merge_server(ALL, ServerDelta::Replace(CacheValue::Posts(vec![post.clone()])));

        assert_eq!(detail_outcome, MergeOutcome::Unchanged);
        assert_eq!(replica.read(&detail), Some(&CacheValue::Post(confirmed.clone())));
        assert_eq!(
            replica.read(&ALL),
            Some(&CacheValue::Posts(vec![confirmed.clone()]))
        );

        // Same rule for data folded into a pending snapshot
        let seq = like(&mut replica, &post, UserId::new());
        assert_eq!(
            replica.merge_server(detail, ServerDelta::Replace(CacheValue::Post(post.clone()))),
            MergeOutcome::Deferred(0)
        );
        assert_eq!(replica.rollback(seq), RollbackOutcome::Restored);
        assert_eq!(replica.read(&detail), Some(&CacheValue::Post(confirmed)));
    }

    #[test]
    fn test_deleted_post_reinserted_at_recorded_index() {
        let author = user_named("alice");
        let first = post_by(&author, "first");
        let second = post_by(&author, "second");
        let mut replica = Replica::new();
        replica.merge_server(
            ALL,
            ServerDelta::Replace(CacheValue::Posts(vec![first.clone(), second.clone()])),
        );

        let seq = replica.begin(MutationKind::DeletePost, MutationTarget::Post(second.id), &[ALL]);
        replica.record_placement(
            seq,
            DeletedPlacement {
                post: second.clone(),
                positions: vec![(ALL, 1)],
            },
        );
        replica
            .project(seq, ALL, |current| {
                ServerDelta::RemovePost(second.id).apply(&ALL, current)
            })
            .unwrap();
        // A refetch without the post lands while the delete is pending
        replica.merge_server(ALL, ServerDelta::Replace(CacheValue::Posts(vec![first.clone()])));

        assert_eq!(replica.rollback(seq), RollbackOutcome::Restored);
        let posts = replica.read(&ALL).and_then(|v| v.as_posts()).unwrap().to_vec();
        assert_eq!(posts, vec![first, second]);
    }

    #[test]
    fn test_handle_recovers_from_poisoned_lock() {
        let handle = CacheHandle::new();
        let clone = handle.clone();
        let _ = std::thread::spawn(move || {
            clone.with::<()>(|_| panic!("poison"));
        })
        .join();

        handle.seed(CacheKey::UserList, CacheValue::Users(vec![]));
        assert_eq!(handle.read(&CacheKey::UserList), Some(CacheValue::Users(vec![])));
    }
}
