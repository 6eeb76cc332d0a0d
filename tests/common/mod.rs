//! Common test utilities and helpers
//!
//! - [`GatedApi`]: a Mutation API whose calls park until the test answers
//!   them through a [`Gate`], so a test can inspect the cache mid-flight
//! - [`FixedReads`]: a read API serving whatever the test put in it
//! - Entity fixtures

#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

use blogcast::client::api::{ApiError, MutationApi, ReadApi};
use blogcast::client::cache::{CacheEntry, CacheKey, CacheValue};
use blogcast::client::replica::CacheHandle;
use blogcast::shared::{
    ApiErrorBody, ApiErrorKind, Comment, FollowOutcome, FollowStats, NewPost, NewUser, Post,
    PostId, PostPatch, User, UserId, UserRef,
};

/// One Mutation API call as the fake saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreatePost(NewPost),
    UpdatePost(PostId, PostPatch),
    DeletePost(PostId),
    ToggleLike(PostId),
    AddComment(PostId, Comment),
    Follow(UserId),
    Unfollow(UserId),
    CreateUser(NewUser),
}

/// What the test answers a call with
#[derive(Debug, Clone)]
pub enum Reply {
    Post(Post),
    Deleted,
    Follow(FollowOutcome),
    User(User),
}

/// A call waiting for its answer; dropping it without answering reads as a
/// lost connection
#[derive(Debug)]
pub struct PendingCall {
    pub call: Call,
    reply: oneshot::Sender<Result<Reply, ApiError>>,
}

impl PendingCall {
    pub fn resolve(self, result: Result<Reply, ApiError>) {
        let _ = self.reply.send(result);
    }

    pub fn ok(self, reply: Reply) {
        self.resolve(Ok(reply));
    }

    pub fn fail(self, err: ApiError) {
        self.resolve(Err(err));
    }
}

#[derive(Debug, Clone)]
pub struct GatedApi {
    calls: mpsc::UnboundedSender<PendingCall>,
}

pub struct Gate {
    calls: mpsc::UnboundedReceiver<PendingCall>,
}

impl Gate {
    /// Next call the client made
    pub async fn next(&mut self) -> PendingCall {
        self.calls.recv().await.expect("client made no further call")
    }
}

pub fn gated() -> (GatedApi, Gate) {
    let (tx, rx) = mpsc::unbounded_channel();
    (GatedApi { calls: tx }, Gate { calls: rx })
}

impl GatedApi {
    async fn call(&self, call: Call) -> Result<Reply, ApiError> {
        let (tx, rx) = oneshot::channel();
        self.calls
            .send(PendingCall { call, reply: tx })
            .map_err(|_| ApiError::Transport("gate closed".to_string()))?;
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Transport("connection reset".to_string())),
        }
    }

    async fn post(&self, call: Call) -> Result<Post, ApiError> {
        match self.call(call).await? {
            Reply::Post(post) => Ok(post),
            other => Err(ApiError::Decode(format!("expected a post, got {:?}", other))),
        }
    }

    async fn follow_outcome(&self, call: Call) -> Result<FollowOutcome, ApiError> {
        match self.call(call).await? {
            Reply::Follow(outcome) => Ok(outcome),
            other => Err(ApiError::Decode(format!("expected an outcome, got {:?}", other))),
        }
    }
}

impl MutationApi for GatedApi {
    async fn create_post(&self, draft: &NewPost) -> Result<Post, ApiError> {
        self.post(Call::CreatePost(draft.clone())).await
    }

    async fn update_post(&self, id: PostId, patch: &PostPatch) -> Result<Post, ApiError> {
        self.post(Call::UpdatePost(id, patch.clone())).await
    }

    async fn delete_post(&self, id: PostId) -> Result<(), ApiError> {
        match self.call(Call::DeletePost(id)).await? {
            Reply::Deleted => Ok(()),
            other => Err(ApiError::Decode(format!("expected no content, got {:?}", other))),
        }
    }

    async fn toggle_like(&self, id: PostId) -> Result<Post, ApiError> {
        self.post(Call::ToggleLike(id)).await
    }

    async fn add_comment(&self, id: PostId, comment: &Comment) -> Result<Post, ApiError> {
        self.post(Call::AddComment(id, comment.clone())).await
    }

    async fn follow(&self, target: UserId) -> Result<FollowOutcome, ApiError> {
        self.follow_outcome(Call::Follow(target)).await
    }

    async fn unfollow(&self, target: UserId) -> Result<FollowOutcome, ApiError> {
        self.follow_outcome(Call::Unfollow(target)).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        match self.call(Call::CreateUser(user.clone())).await? {
            Reply::User(user) => Ok(user),
            other => Err(ApiError::Decode(format!("expected a user, got {:?}", other))),
        }
    }
}

/// Read API answering from a fixed table; unknown keys are 404s
#[derive(Debug, Default)]
pub struct FixedReads {
    values: Mutex<HashMap<CacheKey, CacheValue>>,
}

impl FixedReads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: CacheKey, value: CacheValue) {
        self.values.lock().unwrap().insert(key, value);
    }
}

impl ReadApi for FixedReads {
    async fn fetch(&self, key: &CacheKey) -> Result<CacheValue, ApiError> {
        self.values.lock().unwrap().get(key).cloned().ok_or_else(|| {
            ApiError::rejected(404, ApiErrorBody::new(ApiErrorKind::NotFound, "not found"))
        })
    }
}

// Fixtures

pub fn user(username: &str) -> User {
    User {
        id: UserId::new(),
        username: username.to_string(),
        name: username.to_uppercase(),
        followers: Vec::new(),
        following: Vec::new(),
        version: 1,
    }
}

pub fn post_by(author: &User, title: &str) -> Post {
    Post {
        id: PostId::new(),
        title: title.to_string(),
        author: None,
        url: None,
        genres: Vec::new(),
        user: author.to_ref(),
        likes: 0,
        liked_by: Vec::new(),
        comments: Vec::new(),
        created_at: Utc::now(),
        version: 1,
    }
}

/// A post created `minutes` ago
pub fn older_post_by(author: &User, title: &str, minutes: i64) -> Post {
    Post {
        created_at: Utc::now() - ChronoDuration::minutes(minutes),
        ..post_by(author, title)
    }
}

/// A post liked by `count` other users
pub fn post_with_likes(author: &User, title: &str, count: usize) -> Post {
    let mut post = post_by(author, title);
    for _ in 0..count {
        post.toggle_like(UserId::new());
    }
    post
}

/// The post as the server returns it after a write
pub fn bumped(post: &Post) -> Post {
    Post {
        version: post.version + 1,
        ..post.clone()
    }
}

pub fn user_ref(user: &User) -> UserRef {
    user.to_ref()
}

pub fn stats(user: UserId, followers_count: u64, following_count: u64) -> FollowStats {
    FollowStats {
        user_id: user,
        followers_count,
        following_count,
    }
}

pub fn entry(cache: &CacheHandle, key: &CacheKey) -> Option<CacheEntry> {
    cache.with(|replica| replica.cache().entry(key).cloned())
}

pub fn cached_post(cache: &CacheHandle, key: &CacheKey, id: PostId) -> Option<Post> {
    cache.read(key).and_then(|value| value.find_post(id).cloned())
}

pub fn post_ids(cache: &CacheHandle, key: &CacheKey) -> Vec<PostId> {
    cache
        .read(key)
        .and_then(|value| value.as_posts().map(|posts| posts.iter().map(|p| p.id).collect()))
        .unwrap_or_default()
}

/// Yield until `done` holds; panics if the runtime never gets there
pub async fn settle_until(mut done: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never held");
}
