//! Property-based tests for the replica and the reconciler

mod common;

use proptest::prelude::*;

use blogcast::client::cache::{CacheEntry, CacheKey, CacheValue, ListScope, ServerDelta};
use blogcast::client::optimistic::{MutationKind, MutationTarget};
use blogcast::client::{CacheHandle, EventReconciler, Replica};
use blogcast::shared::{BroadcastEvent, Comment, Post, RealtimeEvent, SessionId, User, UserId};

use common::{post_with_likes, user};

#[derive(Debug, Clone)]
enum Edit {
    Like(usize),
    Comment(String),
    Retitle(String),
}

/// An edit with its ids fixed, shared by the projection and the server
#[derive(Debug, Clone)]
enum Change {
    Like(UserId),
    Comment(Comment),
    Retitle(String),
}

impl Change {
    fn resolve(edit: &Edit, likers: &[User]) -> Self {
        match edit {
            Edit::Like(index) => Self::Like(likers[*index].id),
            Edit::Comment(text) => Self::Comment(Comment::compose(text, "alice").unwrap()),
            Edit::Retitle(title) => Self::Retitle(title.clone()),
        }
    }

    fn kind(&self) -> MutationKind {
        match self {
            Self::Like(_) => MutationKind::ToggleLike,
            Self::Comment(_) => MutationKind::AddComment,
            Self::Retitle(_) => MutationKind::UpdatePost,
        }
    }

    fn apply(&self, post: &mut Post) {
        match self {
            Self::Like(user) => {
                post.toggle_like(*user);
            }
            Self::Comment(comment) => post.push_comment(comment.clone()),
            Self::Retitle(title) => post.title = title.clone(),
        }
    }
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0..3usize).prop_map(Edit::Like),
        "[a-z]{1,8}".prop_map(Edit::Comment),
        "[A-Za-z]{1,12}".prop_map(Edit::Retitle),
    ]
}

/// Edits, whether each succeeds, and the order they settle in
fn schedule() -> impl Strategy<Value = (Vec<(Edit, bool)>, Vec<usize>)> {
    prop::collection::vec((edit(), any::<bool>()), 1..6).prop_flat_map(|ops| {
        let order: Vec<usize> = (0..ops.len()).collect();
        (Just(ops), Just(order).prop_shuffle())
    })
}

struct Fixture {
    post: Post,
    likers: Vec<User>,
    keys: Vec<CacheKey>,
}

fn fixture() -> Fixture {
    let author = user("alice");
    let post = post_with_likes(&author, "hello", 2);
    Fixture {
        keys: vec![
            CacheKey::PostDetail(post.id),
            CacheKey::PostList(ListScope::All),
            CacheKey::PostList(ListScope::ByAuthor(author.id)),
        ],
        likers: vec![user("bob"), user("carol"), author],
        post,
    }
}

fn seeded(fixture: &Fixture) -> Replica {
    let mut replica = Replica::new();
    for key in &fixture.keys {
        let value = match key {
            CacheKey::PostDetail(_) => CacheValue::Post(fixture.post.clone()),
            _ => CacheValue::Posts(vec![fixture.post.clone()]),
        };
        replica.merge_server(*key, ServerDelta::Replace(value));
    }
    replica
}

fn begin(replica: &mut Replica, fixture: &Fixture, change: &Change) -> u64 {
    let id = fixture.post.id;
    let seq = replica.begin(change.kind(), MutationTarget::Post(id), &fixture.keys);
    for key in &fixture.keys {
        replica
            .project(seq, *key, |current| current?.map_post(id, |post| change.apply(post)))
            .unwrap();
    }
    seq
}

fn entries(replica: &Replica, keys: &[CacheKey]) -> Vec<Option<CacheEntry>> {
    keys.iter()
        .map(|key| replica.cache().entry(key).cloned())
        .collect()
}

/// Every cached copy has a like count matching a duplicate-free liked-by set
fn likes_consistent(replica: &Replica, fixture: &Fixture) -> bool {
    fixture.keys.iter().all(|key| {
        let Some(post) = replica.read(key).and_then(|v| v.find_post(fixture.post.id)) else {
            return true;
        };
        let mut seen = post.liked_by.clone();
        seen.sort();
        seen.dedup();
        post.likes == post.liked_by.len() as u64 && seen.len() == post.liked_by.len()
    })
}

proptest! {
    #[test]
    fn prop_settling_in_any_order_converges_on_server_state((ops, order) in schedule()) {
        let fixture = fixture();
        let mut replica = seeded(&fixture);
        let mut server = fixture.post.clone();

        let mut pending = Vec::new();
        for (edit, succeeds) in &ops {
            let change = Change::resolve(edit, &fixture.likers);
            let seq = begin(&mut replica, &fixture, &change);
            prop_assert!(likes_consistent(&replica, &fixture));
            pending.push((seq, change, *succeeds));
        }

        for index in order {
            let (seq, change, succeeds) = &pending[index];
            if *succeeds {
                change.apply(&mut server);
                server.version += 1;
                let deltas = fixture
                    .keys
                    .iter()
                    .map(|key| (*key, ServerDelta::UpsertPost(server.clone())))
                    .collect();
                replica.commit(*seq, deltas);
            } else {
                replica.rollback(*seq);
            }
            prop_assert!(likes_consistent(&replica, &fixture));
        }

        prop_assert!(replica.ledger().is_empty());
        for key in &fixture.keys {
            let cached = replica.read(key).and_then(|v| v.find_post(fixture.post.id));
            prop_assert_eq!(cached, Some(&server));
        }
    }

    #[test]
    fn prop_failures_in_any_order_restore_original_entries((ops, order) in schedule()) {
        let fixture = fixture();
        let mut replica = seeded(&fixture);
        let original = entries(&replica, &fixture.keys);

        let seqs: Vec<u64> = ops
            .iter()
            .map(|(edit, _)| {
                let change = Change::resolve(edit, &fixture.likers);
                begin(&mut replica, &fixture, &change)
            })
            .collect();
        for index in order {
            replica.rollback(seqs[index]);
        }

        prop_assert_eq!(entries(&replica, &fixture.keys), original);
    }

    #[test]
    fn prop_own_events_are_idempotent(edits in prop::collection::vec(edit(), 1..6)) {
        let fixture = fixture();
        let session = SessionId::new();
        let cache = CacheHandle::new();
        cache.with(|replica| *replica = seeded(&fixture));
        let reconciler = EventReconciler::new(cache.clone()).with_session(session);
        let mut server = fixture.post.clone();

        for edit in &edits {
            let change = Change::resolve(edit, &fixture.likers);
            let seq = cache.with(|replica| begin(replica, &fixture, &change));
            change.apply(&mut server);
            server.version += 1;
            let deltas = fixture
                .keys
                .iter()
                .map(|key| (*key, ServerDelta::UpsertPost(server.clone())))
                .collect();
            cache.with(|replica| replica.commit(seq, deltas));
            let committed = cache.with(|replica| entries(replica, &fixture.keys));

            let event = RealtimeEvent::new(BroadcastEvent::post_updated(server.clone()))
                .with_origin(Some(session));
            for _ in 0..2 {
                reconciler.apply(&event);
                let delivered = cache.with(|replica| entries(replica, &fixture.keys));
                prop_assert_eq!(&delivered, &committed);
            }
        }
    }
}
