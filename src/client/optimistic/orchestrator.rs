//! Mutation Orchestrator
//!
//! Runs every user mutation through the same lifecycle:
//!
//! ```text
//! Snapshotting -> OptimisticApplied -> AwaitingServer -> Committed
//!                                                     -> RolledBack
//! ```
//!
//! Snapshot and projection happen under one lock acquisition, so no event
//! can land between them. The lock is released before the Mutation API call
//! and taken again to settle.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::api::{ApiError, MutationApi};
use crate::client::cache::{CacheError, CacheKey, QueryCache, ServerDelta};
use crate::client::notification::{Notification, Notifier};
use crate::client::replica::{CacheHandle, Replica, RollbackOutcome};
use crate::shared::entity::{
    Comment, FollowOutcome, NewPost, Post, PostId, PostPatch, UserId, UserRef,
};

use super::error::MutationError;
use super::ledger::{DeletedPlacement, MutationKind, MutationState, MutationTarget};
use super::projection::{self, FollowCount};

pub struct MutationOrchestrator<A> {
    api: A,
    cache: CacheHandle,
    notifier: Notifier,
    actor: UserRef,
    timeout: Duration,
}

impl<A: MutationApi> MutationOrchestrator<A> {
    pub fn new(
        api: A,
        cache: CacheHandle,
        notifier: Notifier,
        actor: UserRef,
        timeout: Duration,
    ) -> Self {
        Self {
            api,
            cache,
            notifier,
            actor,
            timeout,
        }
    }

    pub fn actor(&self) -> &UserRef {
        &self.actor
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Create a post, showing it at the head of the global and author lists
    /// until the server confirms it
    pub async fn create_post(&self, draft: NewPost) -> Result<Post, MutationError> {
        let kind = MutationKind::CreatePost;
        let id = draft.id.unwrap_or_default();
        let draft = NewPost {
            id: Some(id),
            ..draft
        };
        let owner = self.actor.id;
        let provisional = projection::provisional_post(&draft, id, &self.actor);

        let (seq, keys) = self.begin(
            kind,
            MutationTarget::Post(id),
            |_| projection::create_keys(owner, id),
            |replica, seq, keys| {
                for key in keys {
                    replica.project(seq, *key, |current| {
                        projection::insert_post(key, current, &provisional)
                    })?;
                }
                Ok(())
            },
        )?;

        self.settle(kind, seq, self.api.create_post(&draft), |post| {
            let mut deltas = Vec::with_capacity(keys.len() + 2);
            if post.id != id {
                // The server ignored the proposed id; drop the provisional row
                for key in keys.iter().filter(|key| matches!(key, CacheKey::PostList(_))) {
                    deltas.push((*key, ServerDelta::RemovePost(id)));
                }
                deltas.push((CacheKey::PostDetail(id), ServerDelta::Invalidate));
            }
            for key in &keys {
                let key = match key {
                    CacheKey::PostDetail(_) => CacheKey::PostDetail(post.id),
                    other => *other,
                };
                deltas.push((key, ServerDelta::InsertPost(post.clone())));
            }
            deltas
        })
        .await
    }

    /// Shallow-merge `patch` into the post wherever it is cached
    pub async fn update_post(&self, id: PostId, patch: PostPatch) -> Result<Post, MutationError> {
        let kind = MutationKind::UpdatePost;
        let (seq, keys) = self.begin(
            kind,
            MutationTarget::Post(id),
            |cache| projection::post_keys(cache, id),
            |replica, seq, keys| {
                for key in keys {
                    replica.project(seq, *key, |current| {
                        projection::patch_post(current, id, &patch)
                    })?;
                }
                Ok(())
            },
        )?;

        self.settle(kind, seq, self.api.update_post(id, &patch), |post| {
            upsert_all(&keys, post)
        })
        .await
    }

    /// Remove the post from every cached list until the server confirms
    pub async fn delete_post(&self, id: PostId) -> Result<(), MutationError> {
        let kind = MutationKind::DeletePost;
        let (seq, keys) = self.begin(
            kind,
            MutationTarget::Post(id),
            |cache| projection::post_keys(cache, id),
            |replica, seq, keys| {
                let cached = keys
                    .iter()
                    .find_map(|key| replica.read(key).and_then(|v| v.find_post(id)).cloned());
                if let Some(post) = cached {
                    let positions = projection::list_positions(replica.cache(), keys, id);
                    replica.record_placement(seq, DeletedPlacement { post, positions });
                }
                for key in keys.iter().filter(|key| matches!(key, CacheKey::PostList(_))) {
                    replica.project(seq, *key, |current| projection::remove_post(current, id))?;
                }
                Ok(())
            },
        )?;

        self.settle(kind, seq, self.api.delete_post(id), |_| {
            keys.iter()
                .map(|key| match key {
                    CacheKey::PostList(_) => (*key, ServerDelta::RemovePost(id)),
                    _ => (*key, ServerDelta::Invalidate),
                })
                .collect()
        })
        .await
    }

    /// Flip the actor's membership in the post's liked-by set
    pub async fn toggle_like(&self, id: PostId) -> Result<Post, MutationError> {
        let kind = MutationKind::ToggleLike;
        let user = self.actor.id;
        let (seq, keys) = self.begin(
            kind,
            MutationTarget::Post(id),
            |cache| projection::post_keys(cache, id),
            |replica, seq, keys| {
                for key in keys {
                    replica.project(seq, *key, |current| {
                        projection::toggle_like(current, id, user)
                    })?;
                }
                Ok(())
            },
        )?;

        self.settle(kind, seq, self.api.toggle_like(id), |post| upsert_all(&keys, post))
            .await
    }

    /// Append a comment; blank text is rejected before anything is cached
    pub async fn add_comment(&self, id: PostId, text: &str) -> Result<Post, MutationError> {
        let kind = MutationKind::AddComment;
        let comment = Comment::compose(text, &self.actor.username)?;
        let (seq, keys) = self.begin(
            kind,
            MutationTarget::Post(id),
            |cache| projection::post_keys(cache, id),
            |replica, seq, keys| {
                for key in keys {
                    replica.project(seq, *key, |current| {
                        projection::append_comment(current, id, &comment)
                    })?;
                }
                Ok(())
            },
        )?;

        self.settle(kind, seq, self.api.add_comment(id, &comment), |post| {
            upsert_all(&keys, post)
        })
        .await
    }

    pub async fn follow(&self, target: UserId) -> Result<FollowOutcome, MutationError> {
        self.change_follow(target, true).await
    }

    pub async fn unfollow(&self, target: UserId) -> Result<FollowOutcome, MutationError> {
        self.change_follow(target, false).await
    }

    /// Follow or unfollow: four keys projected and restored together
    async fn change_follow(
        &self,
        target: UserId,
        follow: bool,
    ) -> Result<FollowOutcome, MutationError> {
        let kind = if follow {
            MutationKind::Follow
        } else {
            MutationKind::Unfollow
        };
        let actor = self.actor.clone();

        let (seq, _keys) = self.begin(
            kind,
            MutationTarget::User(target),
            |_| projection::follow_keys(actor.id, target),
            |replica, seq, _keys| {
                let target_ref = projection::lookup_user_ref(replica.cache(), target);
                if follow {
                    replica.project(seq, CacheKey::Followers(target), |current| {
                        projection::follow_list_insert(current, &actor)
                    })?;
                    replica.project(seq, CacheKey::Following(actor.id), |current| {
                        projection::follow_list_insert(current, &target_ref)
                    })?;
                } else {
                    replica.project(seq, CacheKey::Followers(target), |current| {
                        projection::follow_list_remove(current, actor.id)
                    })?;
                    replica.project(seq, CacheKey::Following(actor.id), |current| {
                        projection::follow_list_remove(current, target)
                    })?;
                }
                replica.project(seq, CacheKey::FollowStats(target), |current| {
                    projection::adjust_count(current, FollowCount::Followers, follow)
                })?;
                replica.project(seq, CacheKey::FollowStats(actor.id), |current| {
                    projection::adjust_count(current, FollowCount::Following, follow)
                })?;
                Ok(())
            },
        )?;

        let call = if follow {
            futures_util::future::Either::Left(self.api.follow(target))
        } else {
            futures_util::future::Either::Right(self.api.unfollow(target))
        };
        self.settle(kind, seq, call, follow_deltas).await
    }

    /// Snapshot the selected keys and apply the projection, atomically
    fn begin(
        &self,
        kind: MutationKind,
        target: MutationTarget,
        select: impl FnOnce(&QueryCache) -> Vec<CacheKey>,
        project: impl FnOnce(&mut Replica, u64, &[CacheKey]) -> Result<(), CacheError>,
    ) -> Result<(u64, Vec<CacheKey>), MutationError> {
        self.cache.with(|replica| {
            let keys = select(replica.cache());
            let seq = replica.begin(kind, target, &keys);
            if let Err(err) = project(replica, seq, &keys) {
                replica.rollback(seq);
                return Err(MutationError::from(err));
            }
            replica.advance(seq, MutationState::OptimisticApplied);
            Ok((seq, keys))
        })
    }

    /// Await the server (bounded by the timeout) and commit or roll back
    async fn settle<T, F>(
        &self,
        kind: MutationKind,
        seq: u64,
        call: F,
        deltas: impl FnOnce(&T) -> Vec<(CacheKey, ServerDelta)>,
    ) -> Result<T, MutationError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        self.cache
            .with(|replica| replica.advance(seq, MutationState::AwaitingServer));
        debug!("[Mutation] {} seq {} awaiting server", kind, seq);

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(self.timeout)),
        };

        match result {
            Ok(value) => {
                let deltas = deltas(&value);
                self.cache.with(|replica| replica.commit(seq, deltas));
                Ok(value)
            }
            Err(source) => Err(self.fail(kind, seq, source)),
        }
    }

    fn fail(&self, kind: MutationKind, seq: u64, source: ApiError) -> MutationError {
        let outcome = self.cache.with(|replica| replica.rollback(seq));
        let restored = outcome == RollbackOutcome::Restored;

        let error = match source {
            ApiError::Rejected { status, body } => MutationError::ServerRejected {
                kind,
                status,
                body,
                rolled_back: restored,
            },
            source if restored => MutationError::RollbackApplied { kind, source },
            source => MutationError::SupersededRollbackSkipped { kind, source },
        };

        match &error {
            MutationError::SupersededRollbackSkipped { .. } => {
                info!("[Mutation] {} seq {}: {}", kind, seq, error);
            }
            _ => {
                warn!("[Mutation] {} seq {}: {}", kind, seq, error);
                self.notifier.notify(Notification::error(error.user_message()));
            }
        }
        error
    }
}

fn upsert_all(keys: &[CacheKey], post: &Post) -> Vec<(CacheKey, ServerDelta)> {
    keys.iter()
        .map(|key| (*key, ServerDelta::UpsertPost(post.clone())))
        .collect()
}

/// Server counts into both stats keys; both lists refetch
pub(crate) fn follow_deltas(outcome: &FollowOutcome) -> Vec<(CacheKey, ServerDelta)> {
    vec![
        (
            CacheKey::FollowStats(outcome.followee),
            ServerDelta::FollowCounts {
                followers_count: Some(outcome.followers_count),
                following_count: None,
            },
        ),
        (
            CacheKey::FollowStats(outcome.follower),
            ServerDelta::FollowCounts {
                followers_count: None,
                following_count: Some(outcome.following_count),
            },
        ),
        (CacheKey::Followers(outcome.followee), ServerDelta::Invalidate),
        (CacheKey::Following(outcome.follower), ServerDelta::Invalidate),
        // Both users' follow sets and versions moved
        (CacheKey::UserDetail(outcome.followee), ServerDelta::Invalidate),
        (CacheKey::UserDetail(outcome.follower), ServerDelta::Invalidate),
    ]
}
