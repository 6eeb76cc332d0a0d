/**
 * Authoritative Store
 *
 * In-memory posts, users and follow edges. The store lives behind one
 * `Arc<RwLock<BlogStore>>` in `AppState`, so every write to an entity is
 * serialized and each successful write bumps that entity's `version`.
 *
 * Posts are kept newest first; users in registration order.
 */

use chrono::Utc;
use serde::Deserialize;

use crate::backend::error::BackendError;
use crate::shared::entity::{
    Comment, FollowList, FollowOutcome, FollowStats, NewPost, NewUser, Post, PostId, PostPatch,
    User, UserId, UserRef,
};

/// Filter of `GET /api/posts`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PostQuery {
    /// Only posts owned by this user
    #[serde(default)]
    pub author: Option<UserId>,
    /// Only posts by users this user follows
    #[serde(default)]
    pub feed: Option<UserId>,
}

#[derive(Debug, Clone, Default)]
pub struct BlogStore {
    posts: Vec<Post>,
    users: Vec<User>,
}

impl BlogStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Users ==========

    pub fn users(&self) -> Vec<User> {
        self.users.clone()
    }

    pub fn user(&self, id: UserId) -> Result<&User, BackendError> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| BackendError::not_found("user"))
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut User, BackendError> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| BackendError::not_found("user"))
    }

    /// Resolve the acting user; an unknown id is not a valid identity
    pub fn actor(&self, id: UserId) -> Result<UserRef, BackendError> {
        self.user(id)
            .map(User::to_ref)
            .map_err(|_| BackendError::Unauthenticated(format!("unknown user {}", id)))
    }

    pub fn create_user(&mut self, new_user: NewUser) -> Result<User, BackendError> {
        new_user.validate()?;
        let username = new_user.username.trim().to_string();
        if self.users.iter().any(|u| u.username == username) {
            return Err(BackendError::conflict("username already taken"));
        }
        let name = match new_user.name.trim() {
            "" => username.clone(),
            name => name.to_string(),
        };
        let user = User {
            id: UserId::new(),
            username,
            name,
            followers: Vec::new(),
            following: Vec::new(),
            version: 1,
        };
        tracing::info!("[Store] user {} registered as {}", user.id, user.username);
        self.users.push(user.clone());
        Ok(user)
    }

    // ========== Posts ==========

    pub fn posts(&self, query: &PostQuery) -> Result<Vec<Post>, BackendError> {
        let followed = match query.feed {
            Some(reader) => Some(self.user(reader)?.following.clone()),
            None => None,
        };
        Ok(self
            .posts
            .iter()
            .filter(|p| query.author.is_none_or(|author| p.user.id == author))
            .filter(|p| followed.as_ref().is_none_or(|f| f.contains(&p.user.id)))
            .cloned()
            .collect())
    }

    pub fn post(&self, id: PostId) -> Result<&Post, BackendError> {
        self.posts
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| BackendError::not_found("post"))
    }

    fn post_mut(&mut self, id: PostId) -> Result<&mut Post, BackendError> {
        self.posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BackendError::not_found("post"))
    }

    /// Owned post, or `Forbidden` if `actor` is not the owner
    fn owned_post_mut(&mut self, actor: UserId, id: PostId) -> Result<&mut Post, BackendError> {
        let post = self.post_mut(id)?;
        if post.user.id != actor {
            return Err(BackendError::forbidden("only the owner can change this post"));
        }
        Ok(post)
    }

    /// Create a post, keeping the id the client proposed
    pub fn create_post(&mut self, actor: UserId, draft: NewPost) -> Result<Post, BackendError> {
        draft.validate()?;
        let owner = self.actor(actor)?;
        let id = draft.id.unwrap_or_default();
        if self.posts.iter().any(|p| p.id == id) {
            return Err(BackendError::conflict("post id already exists"));
        }
        let post = Post {
            id,
            title: draft.title.trim().to_string(),
            author: draft.author,
            url: draft.url,
            genres: draft.genres,
            user: owner,
            likes: 0,
            liked_by: Vec::new(),
            comments: Vec::new(),
            created_at: Utc::now(),
            version: 1,
        };
        tracing::info!("[Store] post {} created by {}", post.id, actor);
        self.posts.insert(0, post.clone());
        Ok(post)
    }

    pub fn update_post(
        &mut self,
        actor: UserId,
        id: PostId,
        patch: &PostPatch,
    ) -> Result<Post, BackendError> {
        patch.validate()?;
        self.actor(actor)?;
        let post = self.owned_post_mut(actor, id)?;
        post.apply_patch(patch);
        post.version += 1;
        Ok(post.clone())
    }

    pub fn delete_post(&mut self, actor: UserId, id: PostId) -> Result<(), BackendError> {
        self.actor(actor)?;
        self.owned_post_mut(actor, id)?;
        self.posts.retain(|p| p.id != id);
        tracing::info!("[Store] post {} deleted by {}", id, actor);
        Ok(())
    }

    pub fn toggle_like(&mut self, actor: UserId, id: PostId) -> Result<Post, BackendError> {
        self.actor(actor)?;
        let post = self.post_mut(id)?;
        let liked = post.toggle_like(actor);
        post.version += 1;
        tracing::debug!("[Store] post {} liked={} by {}", id, liked, actor);
        Ok(post.clone())
    }

    /// Append a comment, keeping the client's comment id
    ///
    /// The author is always the acting user. A comment id the post already
    /// holds is accepted without a second copy.
    pub fn add_comment(
        &mut self,
        actor: UserId,
        id: PostId,
        comment: Comment,
    ) -> Result<Post, BackendError> {
        let author = self.actor(actor)?;
        let mut accepted = Comment::compose(&comment.text, &author.username)?;
        accepted.id = comment.id;

        let post = self.post_mut(id)?;
        if post.comments.iter().any(|c| c.id == accepted.id) {
            return Ok(post.clone());
        }
        post.push_comment(accepted);
        post.version += 1;
        Ok(post.clone())
    }

    // ========== Follows ==========

    pub fn follow(&mut self, actor: UserId, target: UserId) -> Result<FollowOutcome, BackendError> {
        self.check_follow(actor, target)?;
        if self.user(actor)?.following.contains(&target) {
            return Err(BackendError::conflict("already following"));
        }
        let follower = self.user_mut(actor)?;
        follower.following.push(target);
        follower.version += 1;
        let followee = self.user_mut(target)?;
        followee.followers.push(actor);
        followee.version += 1;
        self.follow_outcome(actor, target, true)
    }

    pub fn unfollow(&mut self, actor: UserId, target: UserId) -> Result<FollowOutcome, BackendError> {
        self.check_follow(actor, target)?;
        if !self.user(actor)?.following.contains(&target) {
            return Err(BackendError::conflict("not following"));
        }
        let follower = self.user_mut(actor)?;
        follower.following.retain(|id| *id != target);
        follower.version += 1;
        let followee = self.user_mut(target)?;
        followee.followers.retain(|id| *id != actor);
        followee.version += 1;
        self.follow_outcome(actor, target, false)
    }

    fn check_follow(&self, actor: UserId, target: UserId) -> Result<(), BackendError> {
        self.actor(actor)?;
        if actor == target {
            return Err(BackendError::validation("user_id", "cannot follow yourself"));
        }
        self.user(target)?;
        Ok(())
    }

    fn follow_outcome(
        &self,
        follower: UserId,
        followee: UserId,
        following: bool,
    ) -> Result<FollowOutcome, BackendError> {
        Ok(FollowOutcome {
            follower,
            followee,
            following,
            followers_count: self.user(followee)?.followers.len() as u64,
            following_count: self.user(follower)?.following.len() as u64,
        })
    }

    pub fn followers(&self, id: UserId) -> Result<FollowList, BackendError> {
        let user = self.user(id)?;
        Ok(FollowList::new(id, self.refs(&user.followers)))
    }

    pub fn following(&self, id: UserId) -> Result<FollowList, BackendError> {
        let user = self.user(id)?;
        Ok(FollowList::new(id, self.refs(&user.following)))
    }

    pub fn follow_stats(&self, id: UserId) -> Result<FollowStats, BackendError> {
        Ok(self.user(id)?.stats())
    }

    fn refs(&self, ids: &[UserId]) -> Vec<UserRef> {
        ids.iter()
            .filter_map(|id| self.user(*id).ok().map(User::to_ref))
            .collect()
    }
}
