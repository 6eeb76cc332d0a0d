//! Pure optimistic projections
//!
//! Each function takes the current cached value and returns the value the
//! mutation should make visible, or `None` to leave the key untouched (for
//! example when the key is not cached or does not hold the entity).

use chrono::Utc;

use crate::client::cache::{CacheKey, CacheValue, KeyPattern, ListScope, QueryCache};
use crate::shared::entity::{Comment, NewPost, Post, PostId, PostPatch, UserId, UserRef};

/// The post a create shows before the server has answered
pub fn provisional_post(draft: &NewPost, id: PostId, owner: &UserRef) -> Post {
    Post {
        id,
        title: draft.title.clone(),
        author: draft.author.clone(),
        url: draft.url.clone(),
        genres: draft.genres.clone(),
        user: owner.clone(),
        likes: 0,
        liked_by: Vec::new(),
        comments: Vec::new(),
        created_at: Utc::now(),
        version: 0,
    }
}

/// Keys a create touches: the global and author lists plus the new detail key
pub fn create_keys(owner: UserId, id: PostId) -> Vec<CacheKey> {
    vec![
        CacheKey::PostList(ListScope::All),
        CacheKey::PostList(ListScope::ByAuthor(owner)),
        CacheKey::PostDetail(id),
    ]
}

/// The detail key of `id` plus every cached post list holding it
pub fn post_keys(cache: &QueryCache, id: PostId) -> Vec<CacheKey> {
    let mut keys = vec![CacheKey::PostDetail(id)];
    let mut lists: Vec<CacheKey> = cache
        .keys_matching(KeyPattern::PostLists)
        .into_iter()
        .filter(|key| cache.read(key).and_then(|v| v.find_post(id)).is_some())
        .collect();
    lists.sort_by_key(|key| key.to_string());
    keys.extend(lists);
    keys
}

/// Keys a follow or unfollow touches
pub fn follow_keys(actor: UserId, target: UserId) -> Vec<CacheKey> {
    vec![
        CacheKey::Followers(target),
        CacheKey::Following(actor),
        CacheKey::FollowStats(target),
        CacheKey::FollowStats(actor),
    ]
}

/// Lists: put the post at the head. Detail: store it.
pub fn insert_post(key: &CacheKey, current: Option<&CacheValue>, post: &Post) -> Option<CacheValue> {
    match (key, current) {
        (CacheKey::PostDetail(_), _) => Some(CacheValue::Post(post.clone())),
        (CacheKey::PostList(_), Some(CacheValue::Posts(posts))) => {
            let mut next = Vec::with_capacity(posts.len() + 1);
            next.push(post.clone());
            next.extend(posts.iter().filter(|p| p.id != post.id).cloned());
            Some(CacheValue::Posts(next))
        }
        _ => None,
    }
}

pub fn patch_post(current: Option<&CacheValue>, id: PostId, patch: &PostPatch) -> Option<CacheValue> {
    current?.map_post(id, |post| post.apply_patch(patch))
}

pub fn toggle_like(current: Option<&CacheValue>, id: PostId, user: UserId) -> Option<CacheValue> {
    current?.map_post(id, |post| {
        post.toggle_like(user);
    })
}

pub fn append_comment(
    current: Option<&CacheValue>,
    id: PostId,
    comment: &Comment,
) -> Option<CacheValue> {
    current?.map_post(id, |post| post.push_comment(comment.clone()))
}

/// Lists only; the detail key keeps its value until the server settles
pub fn remove_post(current: Option<&CacheValue>, id: PostId) -> Option<CacheValue> {
    match current? {
        CacheValue::Posts(posts) => Some(CacheValue::Posts(
            posts.iter().filter(|p| p.id != id).cloned().collect(),
        )),
        _ => None,
    }
}

/// Index of the post in each list that holds it
pub fn list_positions(cache: &QueryCache, keys: &[CacheKey], id: PostId) -> Vec<(CacheKey, usize)> {
    keys.iter()
        .filter_map(|key| {
            let posts = cache.read(key)?.as_posts()?;
            let index = posts.iter().position(|p| p.id == id)?;
            Some((*key, index))
        })
        .collect()
}

pub fn follow_list_insert(current: Option<&CacheValue>, user: &UserRef) -> Option<CacheValue> {
    let mut list = current?.as_follow_list()?.clone();
    list.insert(user.clone());
    Some(CacheValue::FollowList(list))
}

pub fn follow_list_remove(current: Option<&CacheValue>, user: UserId) -> Option<CacheValue> {
    let mut list = current?.as_follow_list()?.clone();
    list.remove(user);
    Some(CacheValue::FollowList(list))
}

/// Which count of a stats entry to adjust
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowCount {
    Followers,
    Following,
}

/// Add one or subtract one, never going below zero
pub fn adjust_count(current: Option<&CacheValue>, count: FollowCount, up: bool) -> Option<CacheValue> {
    let mut stats = *current?.as_follow_stats()?;
    let field = match count {
        FollowCount::Followers => &mut stats.followers_count,
        FollowCount::Following => &mut stats.following_count,
    };
    *field = if up {
        field.saturating_add(1)
    } else {
        field.saturating_sub(1)
    };
    Some(CacheValue::FollowStats(stats))
}

/// Best-known reference for `id` from whatever the cache holds
pub fn lookup_user_ref(cache: &QueryCache, id: UserId) -> UserRef {
    if let Some(user) = cache.read(&CacheKey::UserDetail(id)).and_then(|v| v.as_user()) {
        return user.to_ref();
    }
    if let Some(user) = cache
        .read(&CacheKey::UserList)
        .and_then(|v| v.as_users())
        .and_then(|users| users.iter().find(|u| u.id == id))
    {
        return user.to_ref();
    }
    UserRef {
        id,
        username: String::new(),
        name: String::new(),
    }
}
