//! Cache keys and key patterns
//!
//! A [`CacheKey`] addresses one cached value: a collection plus a selector
//! that narrows it to one entity or one list. [`KeyPattern`] selects a set of
//! keys for invalidation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::entity::{PostId, UserId};

/// Which posts a post list holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "user", rename_all = "snake_case")]
pub enum ListScope {
    /// Global feed
    All,
    /// Posts owned by one user (profile feed)
    ByAuthor(UserId),
    /// Posts by the users that one user follows
    Feed(UserId),
}

/// Address of one cached value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    PostList(ListScope),
    PostDetail(PostId),
    UserList,
    UserDetail(UserId),
    Followers(UserId),
    Following(UserId),
    FollowStats(UserId),
}

/// Collection part of a [`CacheKey`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCollection {
    PostList,
    PostDetail,
    UserList,
    UserDetail,
    Followers,
    Following,
    FollowStats,
}

impl CacheKey {
    pub fn collection(&self) -> KeyCollection {
        match self {
            Self::PostList(_) => KeyCollection::PostList,
            Self::PostDetail(_) => KeyCollection::PostDetail,
            Self::UserList => KeyCollection::UserList,
            Self::UserDetail(_) => KeyCollection::UserDetail,
            Self::Followers(_) => KeyCollection::Followers,
            Self::Following(_) => KeyCollection::Following,
            Self::FollowStats(_) => KeyCollection::FollowStats,
        }
    }

    /// Lists and the aggregates derived from lists.
    ///
    /// These are the keys whose contents depend on events about *other*
    /// entities, so they cannot be trusted after missed events.
    pub fn is_list_shaped(&self) -> bool {
        !matches!(self, Self::PostDetail(_) | Self::UserDetail(_))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PostList(ListScope::All) => write!(f, "posts/list/all"),
            Self::PostList(ListScope::ByAuthor(user)) => write!(f, "posts/list/author/{}", user),
            Self::PostList(ListScope::Feed(user)) => write!(f, "posts/list/feed/{}", user),
            Self::PostDetail(id) => write!(f, "posts/detail/{}", id),
            Self::UserList => write!(f, "users/list"),
            Self::UserDetail(id) => write!(f, "users/detail/{}", id),
            Self::Followers(id) => write!(f, "followers/{}", id),
            Self::Following(id) => write!(f, "following/{}", id),
            Self::FollowStats(id) => write!(f, "followStats/{}", id),
        }
    }
}

/// Selects the keys an invalidation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPattern {
    Exact(CacheKey),
    Collection(KeyCollection),
    /// Every post list, whatever its scope
    PostLists,
    /// Every list-shaped or aggregate key
    AllLists,
    All,
}

impl KeyPattern {
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            Self::Exact(exact) => exact == key,
            Self::Collection(collection) => key.collection() == *collection,
            Self::PostLists => matches!(key, CacheKey::PostList(_)),
            Self::AllLists => key.is_list_shaped(),
            Self::All => true,
        }
    }
}

impl From<CacheKey> for KeyPattern {
    fn from(key: CacheKey) -> Self {
        Self::Exact(key)
    }
}
