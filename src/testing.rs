//! Fixtures for unit tests

use chrono::Utc;

use crate::shared::entity::{Post, PostId, User, UserId};

pub(crate) fn user_named(username: &str) -> User {
    User {
        id: UserId::new(),
        username: username.to_string(),
        name: username.to_string(),
        followers: Vec::new(),
        following: Vec::new(),
        version: 1,
    }
}

pub(crate) fn post_by(owner: &User, title: &str) -> Post {
    Post {
        id: PostId::new(),
        title: title.to_string(),
        author: None,
        url: None,
        genres: Vec::new(),
        user: owner.to_ref(),
        likes: 0,
        liked_by: Vec::new(),
        comments: Vec::new(),
        created_at: Utc::now(),
        version: 1,
    }
}
