/**
 * Entity Data Structures
 *
 * This module defines the records that flow through the Mutation API, the
 * read path and the broadcast channel: posts, users, comments and the
 * follow relationship shapes.
 *
 * The same structs are used on the server (as the authoritative record)
 * and on the client (as cached values), so the JSON shape of a Mutation
 * API response is identical to the payload of a broadcast event.
 *
 * # Versions
 *
 * `Post` and `User` carry a `version` that the server increments on every
 * write. Writes to a single entity are serialized by the store, so a larger
 * version is always a later state of the same entity.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::shared::error::SharedError;

/// Identifier of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

/// Identifier of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl PostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of entity carried by events and deletions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Post,
    User,
}

/// Populated reference to a user, as embedded in posts and follow lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    pub username: String,
    pub name: String,
}

/// A comment on a post
///
/// The `id` is chosen by the client that writes the comment and kept by the
/// server, so the optimistic copy and the confirmed copy are the same comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    /// Username of the commenter
    pub author: String,
    pub date: DateTime<Utc>,
}

impl Comment {
    /// Build a new comment, trimming the text
    ///
    /// # Errors
    ///
    /// Returns a validation error if the text is blank.
    pub fn compose(text: &str, author: &str) -> Result<Self, SharedError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SharedError::validation("text", "comment cannot be empty"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
            author: author.to_string(),
            date: Utc::now(),
        })
    }
}

/// A blog post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    /// Owner of the post
    pub user: UserRef,
    /// Always equal to `liked_by.len()`
    pub likes: u64,
    /// Users who like the post, in the order they liked it
    #[serde(default)]
    pub liked_by: Vec<UserId>,
    /// Comments in append order
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    /// Server write counter; 0 for a provisional post that the server has not seen
    #[serde(default)]
    pub version: u64,
}

impl Post {
    /// Whether `user` is in the liked-by set
    pub fn is_liked_by(&self, user: UserId) -> bool {
        self.liked_by.contains(&user)
    }

    /// Toggle membership of `user` in the liked-by set
    ///
    /// The count is recomputed from the set so the two can never drift.
    /// Returns `true` if the post is now liked by `user`.
    pub fn toggle_like(&mut self, user: UserId) -> bool {
        let liked = match self.liked_by.iter().position(|id| *id == user) {
            Some(index) => {
                self.liked_by.remove(index);
                false
            }
            None => {
                self.liked_by.push(user);
                true
            }
        };
        self.likes = self.liked_by.len() as u64;
        liked
    }

    /// Append a comment unless a comment with the same id is already present
    pub fn push_comment(&mut self, comment: Comment) {
        if !self.comments.iter().any(|c| c.id == comment.id) {
            self.comments.push(comment);
        }
    }

    /// Shallow-merge the fields present in `patch`
    pub fn apply_patch(&mut self, patch: &PostPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(author) = &patch.author {
            self.author = Some(author.clone());
        }
        if let Some(url) = &patch.url {
            self.url = Some(url.clone());
        }
        if let Some(genres) = &patch.genres {
            self.genres = genres.clone();
        }
    }
}

/// Payload for creating a post
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewPost {
    /// Client-proposed id so the provisional and confirmed post share identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PostId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl NewPost {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Check the fields the server would reject
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.title.trim().is_empty() {
            return Err(SharedError::validation("title", "Missing or invalid title"));
        }
        Ok(())
    }
}

/// Partial update of a post
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
}

impl PostPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SharedError> {
        match &self.title {
            Some(title) if title.trim().is_empty() => {
                Err(SharedError::validation("title", "Missing or invalid title"))
            }
            _ => Ok(()),
        }
    }
}

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub followers: Vec<UserId>,
    #[serde(default)]
    pub following: Vec<UserId>,
    #[serde(default)]
    pub version: u64,
}

impl User {
    pub fn to_ref(&self) -> UserRef {
        UserRef {
            id: self.id,
            username: self.username.clone(),
            name: self.name.clone(),
        }
    }

    pub fn stats(&self) -> FollowStats {
        FollowStats {
            user_id: self.id,
            followers_count: self.followers.len() as u64,
            following_count: self.following.len() as u64,
        }
    }
}

/// Payload for registering a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub name: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.username.trim().chars().count() < 3 {
            return Err(SharedError::validation("username", "invalid username"));
        }
        Ok(())
    }
}

/// Follower/following counts of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowStats {
    pub user_id: UserId,
    pub followers_count: u64,
    pub following_count: u64,
}

/// Followers or followees of one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowList {
    pub user_id: UserId,
    pub users: Vec<UserRef>,
    /// Always equal to `users.len()`
    pub count: u64,
}

impl FollowList {
    pub fn new(user_id: UserId, users: Vec<UserRef>) -> Self {
        let count = users.len() as u64;
        Self { user_id, users, count }
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.users.iter().any(|u| u.id == user)
    }

    /// Append `user` if absent
    pub fn insert(&mut self, user: UserRef) {
        if !self.contains(user.id) {
            self.users.push(user);
        }
        self.count = self.users.len() as u64;
    }

    /// Remove `user` if present
    pub fn remove(&mut self, user: UserId) {
        self.users.retain(|u| u.id != user);
        self.count = self.users.len() as u64;
    }
}

/// Result of a follow or unfollow, also the relationship-changed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowOutcome {
    pub follower: UserId,
    pub followee: UserId,
    /// `true` after a follow, `false` after an unfollow
    pub following: bool,
    /// The followee's follower count
    pub followers_count: u64,
    /// The follower's following count
    pub following_count: u64,
}
