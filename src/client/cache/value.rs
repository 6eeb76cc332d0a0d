//! Cached values
//!
//! [`CacheValue`] is what a [`CacheKey`](super::CacheKey) maps to. [`ServerDelta`]
//! describes a server-authoritative change to one cached value; the same
//! delta is applied to the live cache or to a pending mutation's snapshot,
//! depending on who owns the key at the time.

use crate::shared::entity::{FollowList, FollowStats, Post, PostId, User};

use super::key::CacheKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    /// Newest first
    Posts(Vec<Post>),
    Post(Post),
    Users(Vec<User>),
    User(User),
    FollowList(FollowList),
    FollowStats(FollowStats),
}

impl CacheValue {
    pub fn as_posts(&self) -> Option<&[Post]> {
        match self {
            Self::Posts(posts) => Some(posts),
            _ => None,
        }
    }

    pub fn as_post(&self) -> Option<&Post> {
        match self {
            Self::Post(post) => Some(post),
            _ => None,
        }
    }

    pub fn as_users(&self) -> Option<&[User]> {
        match self {
            Self::Users(users) => Some(users),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Self::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn as_follow_list(&self) -> Option<&FollowList> {
        match self {
            Self::FollowList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_follow_stats(&self) -> Option<&FollowStats> {
        match self {
            Self::FollowStats(stats) => Some(stats),
            _ => None,
        }
    }

    /// Look up one post in a list or detail value
    pub fn find_post(&self, id: PostId) -> Option<&Post> {
        match self {
            Self::Posts(posts) => posts.iter().find(|p| p.id == id),
            Self::Post(post) if post.id == id => Some(post),
            _ => None,
        }
    }

    /// Apply `f` to the post with `id`, wherever it sits in this value
    ///
    /// Returns the updated value, or `None` if the post is not here.
    pub fn map_post(&self, id: PostId, f: impl FnOnce(&mut Post)) -> Option<CacheValue> {
        match self {
            Self::Posts(posts) => {
                let index = posts.iter().position(|p| p.id == id)?;
                let mut posts = posts.clone();
                f(&mut posts[index]);
                Some(Self::Posts(posts))
            }
            Self::Post(post) if post.id == id => {
                let mut post = post.clone();
                f(&mut post);
                Some(Self::Post(post))
            }
            _ => None,
        }
    }
}

/// A server-authoritative change to one cached value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerDelta {
    /// Full value from the read path
    ///
    /// Entities already cached at a newer version are kept; a single entity
    /// older than the cached copy leaves the value alone.
    Replace(CacheValue),
    /// Replace a post wherever it already is; create the detail entry if absent
    UpsertPost(Post),
    /// Like `UpsertPost`, but also insert at the head of lists that lack it
    InsertPost(Post),
    RemovePost(PostId),
    UpsertUser(User),
    /// Like `UpsertUser`, but also append to user lists that lack it
    InsertUser(User),
    /// Overwrite counts on an existing stats entry
    FollowCounts {
        followers_count: Option<u64>,
        following_count: Option<u64>,
    },
    /// Mark the entry stale without changing its value
    Invalidate,
}

impl ServerDelta {
    /// Whether applying the delta yields a complete, fresh value
    pub fn refreshes(&self) -> bool {
        matches!(self, Self::Replace(_))
    }

    /// Compute the value `key` should hold after this delta
    ///
    /// Returns `None` when the delta does not change the value: the entity
    /// is absent from a list, the cached copy is at a newer version, or the
    /// delta does not apply to this kind of value.
    pub fn apply(&self, key: &CacheKey, current: Option<&CacheValue>) -> Option<CacheValue> {
        match self {
            Self::Replace(value) => replace(current, value),
            Self::UpsertPost(post) => upsert_post(key, current, post, false),
            Self::InsertPost(post) => upsert_post(key, current, post, true),
            Self::RemovePost(id) => match current? {
                CacheValue::Posts(posts) if posts.iter().any(|p| p.id == *id) => Some(
                    CacheValue::Posts(posts.iter().filter(|p| p.id != *id).cloned().collect()),
                ),
                _ => None,
            },
            Self::UpsertUser(user) => upsert_user(key, current, user, false),
            Self::InsertUser(user) => upsert_user(key, current, user, true),
            Self::FollowCounts {
                followers_count,
                following_count,
            } => {
                let mut stats = *current?.as_follow_stats()?;
                if let Some(count) = followers_count {
                    stats.followers_count = *count;
                }
                if let Some(count) = following_count {
                    stats.following_count = *count;
                }
                Some(CacheValue::FollowStats(stats))
            }
            Self::Invalidate => None,
        }
    }
}

fn replace(current: Option<&CacheValue>, incoming: &CacheValue) -> Option<CacheValue> {
    match (current, incoming) {
        (Some(CacheValue::Post(cached)), CacheValue::Post(post))
            if cached.id == post.id && cached.version > post.version =>
        {
            None
        }
        (Some(CacheValue::User(cached)), CacheValue::User(user))
            if cached.id == user.id && cached.version > user.version =>
        {
            None
        }
        (Some(CacheValue::Posts(cached)), CacheValue::Posts(posts)) => Some(CacheValue::Posts(
            posts
                .iter()
                .map(|post| match cached.iter().find(|c| c.id == post.id) {
                    Some(newer) if newer.version > post.version => newer.clone(),
                    _ => post.clone(),
                })
                .collect(),
        )),
        (Some(CacheValue::Users(cached)), CacheValue::Users(users)) => Some(CacheValue::Users(
            users
                .iter()
                .map(|user| match cached.iter().find(|c| c.id == user.id) {
                    Some(newer) if newer.version > user.version => newer.clone(),
                    _ => user.clone(),
                })
                .collect(),
        )),
        _ => Some(incoming.clone()),
    }
}

fn upsert_post(
    key: &CacheKey,
    current: Option<&CacheValue>,
    incoming: &Post,
    insert: bool,
) -> Option<CacheValue> {
    match (key, current) {
        (CacheKey::PostDetail(id), None) if *id == incoming.id => {
            Some(CacheValue::Post(incoming.clone()))
        }
        (_, Some(CacheValue::Post(post))) if post.id == incoming.id => {
            (post.version <= incoming.version).then(|| CacheValue::Post(incoming.clone()))
        }
        (_, Some(CacheValue::Posts(posts))) => {
            match posts.iter().position(|p| p.id == incoming.id) {
                Some(index) => {
                    if posts[index].version > incoming.version {
                        return None;
                    }
                    let mut posts = posts.clone();
                    posts[index] = incoming.clone();
                    Some(CacheValue::Posts(posts))
                }
                None if insert => {
                    let mut posts = posts.clone();
                    let index = posts
                        .iter()
                        .position(|p| p.created_at <= incoming.created_at)
                        .unwrap_or(posts.len());
                    posts.insert(index, incoming.clone());
                    Some(CacheValue::Posts(posts))
                }
                None => None,
            }
        }
        _ => None,
    }
}

fn upsert_user(
    key: &CacheKey,
    current: Option<&CacheValue>,
    incoming: &User,
    insert: bool,
) -> Option<CacheValue> {
    match (key, current) {
        (CacheKey::UserDetail(id), None) if *id == incoming.id => {
            Some(CacheValue::User(incoming.clone()))
        }
        (_, Some(CacheValue::User(user))) if user.id == incoming.id => {
            (user.version <= incoming.version).then(|| CacheValue::User(incoming.clone()))
        }
        (_, Some(CacheValue::Users(users))) => match users.iter().position(|u| u.id == incoming.id) {
            Some(index) => {
                if users[index].version > incoming.version {
                    return None;
                }
                let mut users = users.clone();
                users[index] = incoming.clone();
                Some(CacheValue::Users(users))
            }
            None if insert => {
                let mut users = users.clone();
                users.push(incoming.clone());
                Some(CacheValue::Users(users))
            }
            None => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::cache::key::ListScope;
    use crate::testing::{post_by, user_named};
    use chrono::Duration;

    const ALL: CacheKey = CacheKey::PostList(ListScope::All);

    #[test]
    fn test_upsert_post_respects_version() {
        let author = user_named("alice");
        let mut post = post_by(&author, "hello");
        post.version = 3;
        let mut older = post.clone();
        older.version = 2;
        older.title = "old".to_string();

        let key = CacheKey::PostDetail(post.id);
        let current = CacheValue::Post(post.clone());
        assert_eq!(ServerDelta::UpsertPost(older).apply(&key, Some(&current)), None);

        let mut newer = post.clone();
        newer.version = 4;
        let applied = ServerDelta::UpsertPost(newer.clone()).apply(&key, Some(&current));
        assert_eq!(applied, Some(CacheValue::Post(newer)));
    }

    #[test]
    fn test_replace_keeps_newer_cached_entities() {
        let author = user_named("alice");
        let mut liked = post_by(&author, "hello");
        liked.toggle_like(author.id);
        liked.version = 2;
        let mut fetched = liked.clone();
        fetched.toggle_like(author.id);
        fetched.version = 1;
        let other = post_by(&author, "other");

        let key = CacheKey::PostDetail(liked.id);
        let current = CacheValue::Post(liked.clone());
        assert_eq!(
            ServerDelta::Replace(CacheValue::Post(fetched.clone())).apply(&key, Some(&current)),
            None
        );

        let list = CacheValue::Posts(vec![liked.clone()]);
        let applied = ServerDelta::Replace(CacheValue::Posts(vec![other.clone(), fetched]))
            .apply(&ALL, Some(&list));
        assert_eq!(applied, Some(CacheValue::Posts(vec![other, liked])));
    }

    #[test]
    fn test_upsert_does_not_insert_into_lists() {
        let author = user_named("alice");
        let post = post_by(&author, "hello");
        let list = CacheValue::Posts(vec![]);

        assert_eq!(ServerDelta::UpsertPost(post.clone()).apply(&ALL, Some(&list)), None);
        assert_eq!(
            ServerDelta::InsertPost(post.clone()).apply(&ALL, Some(&list)),
            Some(CacheValue::Posts(vec![post]))
        );
    }

    #[test]
    fn test_insert_keeps_lists_newest_first() {
        let author = user_named("alice");
        let newest = post_by(&author, "newest");
        let mut oldest = post_by(&author, "oldest");
        oldest.created_at = newest.created_at - Duration::hours(2);
        let mut middle = post_by(&author, "middle");
        middle.created_at = newest.created_at - Duration::hours(1);

        let list = CacheValue::Posts(vec![newest.clone(), oldest.clone()]);
        let applied = ServerDelta::InsertPost(middle.clone())
            .apply(&ALL, Some(&list))
            .unwrap();
        let titles: Vec<_> = applied
            .as_posts()
            .unwrap()
            .iter()
            .map(|p| p.title.as_str())
            .collect();
        assert_eq!(titles, vec!["newest", "middle", "oldest"]);
    }

    #[test]
    fn test_insert_into_absent_list_is_noop() {
        let author = user_named("alice");
        let post = post_by(&author, "hello");
        assert_eq!(ServerDelta::InsertPost(post).apply(&ALL, None), None);
    }

    #[test]
    fn test_remove_post() {
        let author = user_named("alice");
        let keep = post_by(&author, "keep");
        let gone = post_by(&author, "gone");
        let list = CacheValue::Posts(vec![keep.clone(), gone.clone()]);

        assert_eq!(
            ServerDelta::RemovePost(gone.id).apply(&ALL, Some(&list)),
            Some(CacheValue::Posts(vec![keep]))
        );
        assert_eq!(ServerDelta::RemovePost(PostId::new()).apply(&ALL, Some(&list)), None);
    }

    #[test]
    fn test_follow_counts_only_update_existing_stats() {
        let user = user_named("alice");
        let key = CacheKey::FollowStats(user.id);
        let delta = ServerDelta::FollowCounts {
            followers_count: Some(5),
            following_count: None,
        };
        assert_eq!(delta.apply(&key, None), None);

        let current = CacheValue::FollowStats(user.stats());
        let applied = delta.apply(&key, Some(&current)).unwrap();
        let stats = applied.as_follow_stats().unwrap();
        assert_eq!(stats.followers_count, 5);
        assert_eq!(stats.following_count, 0);
    }

    #[test]
    fn test_insert_user_appends_to_user_list() {
        let alice = user_named("alice");
        let bob = user_named("bob");
        let list = CacheValue::Users(vec![alice.clone()]);

        let applied = ServerDelta::InsertUser(bob.clone())
            .apply(&CacheKey::UserList, Some(&list))
            .unwrap();
        assert_eq!(applied, CacheValue::Users(vec![alice, bob]));
    }
}
