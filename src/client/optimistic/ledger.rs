//! # Mutation Ledger
//!
//! Bookkeeping for in-flight mutations: one [`PendingMutation`] per mutation,
//! keyed by a per-session sequence number that increases monotonically.
//!
//! Each pending mutation owns the [`Snapshot`] of every key it is about to
//! project onto. The snapshot is what a rollback restores; server data that
//! lands on a key while a mutation is pending is folded into it so that the
//! restored value is not older than what the server has already said.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use crate::client::cache::{CacheEntry, CacheKey, QueryCache, ServerDelta};
use crate::shared::entity::{Post, PostId, UserId};

/// What a mutation does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    CreatePost,
    UpdatePost,
    DeletePost,
    ToggleLike,
    AddComment,
    Follow,
    Unfollow,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreatePost => "create-post",
            Self::UpdatePost => "update-post",
            Self::DeletePost => "delete-post",
            Self::ToggleLike => "toggle-like",
            Self::AddComment => "add-comment",
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
        };
        f.write_str(name)
    }
}

/// Entity a mutation acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationTarget {
    Post(PostId),
    User(UserId),
}

impl fmt::Display for MutationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post(id) => write!(f, "post {}", id),
            Self::User(id) => write!(f, "user {}", id),
        }
    }
}

/// Lifecycle of a pending mutation
///
/// A mutation leaves the ledger when it settles, by commit or rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Snapshotting,
    OptimisticApplied,
    AwaitingServer,
}

/// Captured cache entries, one per key, taken before projection
///
/// `None` records that the key was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<(CacheKey, Option<CacheEntry>)>,
}

impl Snapshot {
    /// Copy the current entries for `keys`; duplicate keys are captured once
    pub fn capture(cache: &QueryCache, keys: &[CacheKey]) -> Self {
        let mut entries: Vec<(CacheKey, Option<CacheEntry>)> = Vec::with_capacity(keys.len());
        for key in keys {
            if entries.iter().any(|(captured, _)| captured == key) {
                continue;
            }
            entries.push((*key, cache.entry(key).cloned()));
        }
        Self { entries }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.iter().any(|(captured, _)| captured == key)
    }

    pub fn get(&self, key: &CacheKey) -> Option<&Option<CacheEntry>> {
        self.entries
            .iter()
            .find(|(captured, _)| captured == key)
            .map(|(_, entry)| entry)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn into_entries(self) -> Vec<(CacheKey, Option<CacheEntry>)> {
        self.entries
    }

    /// Swap in an older captured entry for `key`
    pub(crate) fn replace(&mut self, key: &CacheKey, entry: Option<CacheEntry>) {
        if let Some(slot) = self.entries.iter_mut().find(|(captured, _)| captured == key) {
            slot.1 = entry;
        }
    }

    /// Fold server data into the captured entry for `key`
    pub(crate) fn merge(&mut self, key: &CacheKey, delta: &ServerDelta) -> bool {
        let Some((_, slot)) = self.entries.iter_mut().find(|(captured, _)| captured == key) else {
            return false;
        };
        match slot {
            Some(entry) => entry.merge(key, delta),
            None => match delta.apply(key, None) {
                Some(value) => {
                    *slot = Some(CacheEntry::confirmed(value));
                    true
                }
                None => false,
            },
        }
    }
}

/// Where a deleted post sat, so a rollback can put it back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedPlacement {
    pub post: Post,
    pub positions: Vec<(CacheKey, usize)>,
}

#[derive(Debug, Clone)]
pub struct PendingMutation {
    pub seq: u64,
    pub kind: MutationKind,
    pub target: MutationTarget,
    pub state: MutationState,
    pub snapshot: Snapshot,
    pub placement: Option<DeletedPlacement>,
    pub started_at: Instant,
}

impl PendingMutation {
    pub fn new(seq: u64, kind: MutationKind, target: MutationTarget, snapshot: Snapshot) -> Self {
        Self {
            seq,
            kind,
            target,
            state: MutationState::Snapshotting,
            snapshot,
            placement: None,
            started_at: Instant::now(),
        }
    }
}

/// Pending mutations ordered by sequence number
#[derive(Debug, Default)]
pub struct MutationLedger {
    last_seq: u64,
    pending: BTreeMap<u64, PendingMutation>,
}

impl MutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next sequence number (starting at 1)
    pub fn next_seq(&mut self) -> u64 {
        self.last_seq += 1;
        self.last_seq
    }

    pub fn register(&mut self, mutation: PendingMutation) {
        self.pending.insert(mutation.seq, mutation);
    }

    pub fn get(&self, seq: u64) -> Option<&PendingMutation> {
        self.pending.get(&seq)
    }

    pub fn get_mut(&mut self, seq: u64) -> Option<&mut PendingMutation> {
        self.pending.get_mut(&seq)
    }

    /// Remove a settled mutation
    pub fn take(&mut self, seq: u64) -> Option<PendingMutation> {
        self.pending.remove(&seq)
    }

    /// Oldest pending mutation newer than `seq` whose snapshot covers `key`
    pub fn next_touching(&self, seq: u64, key: &CacheKey) -> Option<u64> {
        self.pending
            .range(seq + 1..)
            .find(|(_, mutation)| mutation.snapshot.contains(key))
            .map(|(seq, _)| *seq)
    }

    /// Snapshots covering `key`, restricted to mutations newer than `after`
    pub fn snapshots_touching(
        &mut self,
        after: u64,
        key: &CacheKey,
    ) -> impl Iterator<Item = &mut Snapshot> + '_ {
        let key = *key;
        self.pending
            .range_mut(after + 1..)
            .map(|(_, mutation)| &mut mutation.snapshot)
            .filter(move |snapshot| snapshot.contains(&key))
    }

    pub fn is_pending(&self, seq: u64) -> bool {
        self.pending.contains_key(&seq)
    }

    pub fn pending_seqs(&self) -> Vec<u64> {
        self.pending.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
