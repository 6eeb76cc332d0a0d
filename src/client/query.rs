//! Read path
//!
//! Serves reads from the cache and refetches keys that are absent or were
//! invalidated. Fetched data is merged like any other server data, so a key
//! a pending mutation owns keeps showing the projection.

use tracing::debug;

use crate::client::api::{ApiError, ReadApi};
use crate::client::cache::{CacheKey, CacheValue, KeyPattern, ServerDelta};
use crate::client::replica::CacheHandle;
use crate::shared::error::ApiErrorKind;

pub struct QueryClient<R> {
    api: R,
    cache: CacheHandle,
}

impl<R: ReadApi> QueryClient<R> {
    pub fn new(api: R, cache: CacheHandle) -> Self {
        Self { api, cache }
    }

    /// Cached value, fetching first if the key is absent or stale
    ///
    /// A stale value is still returned if the refetch fails with a transport
    /// error. A key the server no longer knows is evicted.
    pub async fn get(&self, key: CacheKey) -> Result<CacheValue, ApiError> {
        let cached = self.cache.with(|replica| {
            let cache = replica.cache();
            (!cache.needs_fetch(&key))
                .then(|| cache.read(&key).cloned())
                .flatten()
        });
        if let Some(value) = cached {
            return Ok(value);
        }

        match self.refetch(key).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_transport() => match self.cache.read(&key) {
                Some(stale) => {
                    debug!("[Query] serving stale {} after: {}", key, err);
                    Ok(stale)
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Fetch `key` from the server regardless of cache state
    pub async fn refetch(&self, key: CacheKey) -> Result<CacheValue, ApiError> {
        debug!("[Query] fetching {}", key);
        match self.api.fetch(&key).await {
            Ok(value) => Ok(self.cache.with(|replica| {
                replica.merge_server(key, ServerDelta::Replace(value.clone()));
                replica.read(&key).cloned().unwrap_or(value)
            })),
            Err(err) => {
                if err.kind() == Some(ApiErrorKind::NotFound) {
                    self.cache.with(|replica| replica.evict(&key));
                }
                Err(err)
            }
        }
    }

    /// Refetch every stale key; returns how many refreshed
    pub async fn refresh_stale(&self) -> usize {
        let keys = self
            .cache
            .with(|replica| replica.cache().stale_keys());
        let mut refreshed = 0;
        for key in keys {
            if self.refetch(key).await.is_ok() {
                refreshed += 1;
            }
        }
        refreshed
    }

    pub fn invalidate(&self, pattern: KeyPattern) -> usize {
        self.cache.with(|replica| replica.invalidate(pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::cache::ListScope;
    use crate::shared::error::ApiErrorBody;
    use crate::testing::{post_by, user_named};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedReads {
        responses: Mutex<HashMap<CacheKey, Result<CacheValue, ApiError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedReads {
        fn respond(&self, key: CacheKey, result: Result<CacheValue, ApiError>) {
            self.responses.lock().unwrap().insert(key, result);
        }
    }

    impl ReadApi for ScriptedReads {
        async fn fetch(&self, key: &CacheKey) -> Result<CacheValue, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .unwrap_or_else(|| Err(ApiError::Transport("unscripted".into())))
        }
    }

    const ALL: CacheKey = CacheKey::PostList(ListScope::All);

    #[tokio::test]
    async fn test_fetches_once_then_serves_from_cache() {
        let alice = user_named("alice");
        let posts = CacheValue::Posts(vec![post_by(&alice, "hello")]);
        let reads = ScriptedReads::default();
        reads.respond(ALL, Ok(posts.clone()));
        let client = QueryClient::new(reads, CacheHandle::new());

        assert_eq!(client.get(ALL).await.unwrap(), posts);
        assert_eq!(client.get(ALL).await.unwrap(), posts);
        assert_eq!(client.api.calls.load(Ordering::SeqCst), 1);

        client.invalidate(KeyPattern::PostLists);
        client.get(ALL).await.unwrap();
        assert_eq!(client.api.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_value_served_when_offline() {
        let cache = CacheHandle::new();
        cache.seed(ALL, CacheValue::Posts(vec![]));
        cache.with(|replica| replica.invalidate(KeyPattern::All));
        let client = QueryClient::new(ScriptedReads::default(), cache);

        assert_eq!(client.get(ALL).await.unwrap(), CacheValue::Posts(vec![]));
    }

    #[tokio::test]
    async fn test_older_response_keeps_newer_cached_post() {
        let alice = user_named("alice");
        let older = post_by(&alice, "before");
        let mut newer = older.clone();
        newer.title = "after".to_string();
        newer.version = 2;
        let key = CacheKey::PostDetail(older.id);

        let cache = CacheHandle::new();
        cache.seed(key, CacheValue::Post(newer.clone()));
        let reads = ScriptedReads::default();
        reads.respond(key, Ok(CacheValue::Post(older)));
        let client = QueryClient::new(reads, cache.clone());

        assert_eq!(client.refetch(key).await.unwrap(), CacheValue::Post(newer.clone()));
        assert_eq!(cache.read(&key), Some(CacheValue::Post(newer)));
    }

    #[tokio::test]
    async fn test_not_found_evicts() {
        let alice = user_named("alice");
        let post = post_by(&alice, "gone");
        let key = CacheKey::PostDetail(post.id);
        let cache = CacheHandle::new();
        cache.seed(key, CacheValue::Post(post));
        cache.with(|replica| replica.invalidate(KeyPattern::Exact(key)));

        let reads = ScriptedReads::default();
        reads.respond(
            key,
            Err(ApiError::rejected(
                404,
                ApiErrorBody::new(ApiErrorKind::NotFound, "post not found"),
            )),
        );
        let client = QueryClient::new(reads, cache.clone());

        assert!(client.get(key).await.is_err());
        assert!(cache.read(&key).is_none());
    }
}
