//! Client session
//!
//! One [`ClientSession`] per client process or tab. It owns a fresh cache and
//! wires the orchestrator, the reconciler and the read path to it; nothing
//! is shared between sessions.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::client::api::{ApiError, HttpApi, MutationApi, ReadApi};
use crate::client::cache::{CacheKey, ServerDelta};
use crate::client::channel::{ChannelEvent, EventChannel};
use crate::client::config::Config;
use crate::client::notification::Notifier;
use crate::client::optimistic::MutationOrchestrator;
use crate::client::query::QueryClient;
use crate::client::reconciliation::EventReconciler;
use crate::client::replica::CacheHandle;
use crate::shared::config::ConfigError;
use crate::shared::entity::{NewUser, User};

const CHANNEL_BUFFER: usize = 256;

pub struct ClientSession<A> {
    config: Config,
    cache: CacheHandle,
    notifier: Notifier,
    mutations: MutationOrchestrator<A>,
    queries: QueryClient<A>,
    reconciler: EventReconciler,
}

impl ClientSession<HttpApi> {
    /// Session talking to the configured server over HTTP
    pub fn connect(config: Config) -> Result<Self, ConfigError> {
        let api = HttpApi::new(config.clone());
        Self::with_api(config, api)
    }

    /// Subscribe to the broadcast channel and feed the reconciler
    pub fn start_realtime(&self) -> (EventChannel, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<ChannelEvent>(CHANNEL_BUFFER);
        let channel = EventChannel::spawn(self.config.clone(), tx);
        let reconciler = tokio::spawn(self.reconciler.clone().run(rx));
        (channel, reconciler)
    }
}

impl<A: MutationApi + ReadApi + Clone> ClientSession<A> {
    pub fn with_api(config: Config, api: A) -> Result<Self, ConfigError> {
        let actor = config.require_actor()?.clone();
        let cache = CacheHandle::new();
        let notifier = Notifier::new();
        let mutations = MutationOrchestrator::new(
            api.clone(),
            cache.clone(),
            notifier.clone(),
            actor,
            config.mutation_timeout(),
        );
        let queries = QueryClient::new(api, cache.clone());
        let reconciler = EventReconciler::new(cache.clone()).with_session(config.session_id());
        info!(
            "[Session] {} started against {}",
            config.session_id(),
            config.server_url()
        );
        Ok(Self {
            config,
            cache,
            notifier,
            mutations,
            queries,
            reconciler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &CacheHandle {
        &self.cache
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn mutations(&self) -> &MutationOrchestrator<A> {
        &self.mutations
    }

    pub fn queries(&self) -> &QueryClient<A> {
        &self.queries
    }

    pub fn reconciler(&self) -> &EventReconciler {
        &self.reconciler
    }

    /// Register a user; not optimistic, the user list updates on success
    pub async fn register_user(&self, user: NewUser) -> Result<User, ApiError> {
        let created = self.mutations.api().create_user(&user).await?;
        self.cache.with(|replica| {
            replica.merge_server(CacheKey::UserList, ServerDelta::InsertUser(created.clone()));
            replica.merge_server(
                CacheKey::UserDetail(created.id),
                ServerDelta::UpsertUser(created.clone()),
            );
        });
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_requires_actor() {
        assert!(matches!(
            ClientSession::connect(Config::new()),
            Err(ConfigError::MissingValue("user_id"))
        ));
    }

    #[test]
    fn test_sessions_do_not_share_caches() {
        let actor = crate::testing::user_named("alice").to_ref();
        let first = ClientSession::connect(Config::new().with_actor(actor.clone())).unwrap();
        let second = ClientSession::connect(Config::new().with_actor(actor)).unwrap();

        first.cache().seed(CacheKey::UserList, crate::client::cache::CacheValue::Users(vec![]));
        assert!(second.cache().read(&CacheKey::UserList).is_none());
        assert_ne!(first.config().session_id(), second.config().session_id());
    }
}
