//! Mutation API and read path clients
//!
//! [`MutationApi`] and [`ReadApi`] are the seams the orchestrator and the
//! query client are generic over. [`HttpApi`] implements both against the
//! blogcast server with reqwest; tests substitute in-process fakes.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::client::cache::{CacheKey, CacheValue, ListScope};
use crate::client::config::Config;
use crate::shared::config::{ACTOR_HEADER, SESSION_HEADER};
use crate::shared::entity::{
    Comment, FollowList, FollowOutcome, FollowStats, NewPost, NewUser, Post, PostId, PostPatch,
    User, UserId,
};
use crate::shared::error::{ApiErrorBody, ApiErrorKind};

/// Failure of a Mutation API or read call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered with a structured rejection
    #[error("server rejected request ({status}): {}", .body.message)]
    Rejected { status: u16, body: ApiErrorBody },

    /// The request never got an answer
    #[error("network error: {0}")]
    Transport(String),

    /// No answer within the client-side bound
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The answer could not be decoded
    #[error("failed to parse response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn rejected(status: u16, body: ApiErrorBody) -> Self {
        Self::Rejected { status, body }
    }

    /// Taxonomy of a server rejection; `None` for transport failures
    pub fn kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Rejected { body, .. } => Some(body.kind),
            _ => None,
        }
    }

    /// Whether the server may never have seen the request
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_timeout() {
            Self::Transport(format!("timed out: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Server-side writes
///
/// Every successful call results in exactly one broadcast event.
pub trait MutationApi: Send + Sync {
    fn create_post(&self, draft: &NewPost) -> impl Future<Output = Result<Post, ApiError>> + Send;

    fn update_post(
        &self,
        id: PostId,
        patch: &PostPatch,
    ) -> impl Future<Output = Result<Post, ApiError>> + Send;

    fn delete_post(&self, id: PostId) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Toggle the actor's like; returns the post with the server's liked-by set
    fn toggle_like(&self, id: PostId) -> impl Future<Output = Result<Post, ApiError>> + Send;

    fn add_comment(
        &self,
        id: PostId,
        comment: &Comment,
    ) -> impl Future<Output = Result<Post, ApiError>> + Send;

    fn follow(&self, target: UserId)
        -> impl Future<Output = Result<FollowOutcome, ApiError>> + Send;

    fn unfollow(
        &self,
        target: UserId,
    ) -> impl Future<Output = Result<FollowOutcome, ApiError>> + Send;

    fn create_user(&self, user: &NewUser) -> impl Future<Output = Result<User, ApiError>> + Send;
}

/// Server-side reads, one per cache key
pub trait ReadApi: Send + Sync {
    fn fetch(&self, key: &CacheKey) -> impl Future<Output = Result<CacheValue, ApiError>> + Send;
}

/// reqwest-backed client for the blogcast HTTP API
#[derive(Debug, Clone)]
pub struct HttpApi {
    config: Config,
    client: Client,
}

impl HttpApi {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Attach actor and session headers
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(SESSION_HEADER, self.config.session_id().to_string());
        match self.config.actor() {
            Some(actor) => request.header(ACTOR_HEADER, actor.id.to_string()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ApiErrorBody>(&text)
            .unwrap_or_else(|_| fallback_body(status, &text));
        warn!("[Api] request failed: {} - {}", status, body.message);
        Err(ApiError::rejected(status.as_u16(), body))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn posts_path(scope: &ListScope) -> String {
        match scope {
            ListScope::All => "/api/posts".to_string(),
            ListScope::ByAuthor(user) => format!("/api/posts?author={}", user),
            ListScope::Feed(user) => format!("/api/posts?feed={}", user),
        }
    }
}

/// Build an error body for responses that did not carry one
fn fallback_body(status: StatusCode, text: &str) -> ApiErrorBody {
    let kind = match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiErrorKind::Validation,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiErrorKind::Authorization,
        StatusCode::NOT_FOUND => ApiErrorKind::NotFound,
        StatusCode::CONFLICT => ApiErrorKind::Conflict,
        _ => ApiErrorKind::Internal,
    };
    let message = if text.trim().is_empty() {
        status.to_string()
    } else {
        text.trim().to_string()
    };
    ApiErrorBody::new(kind, message)
}

impl MutationApi for HttpApi {
    async fn create_post(&self, draft: &NewPost) -> Result<Post, ApiError> {
        let url = self.config.api_url("/api/posts");
        self.json(self.client.post(&url).json(draft)).await
    }

    async fn update_post(&self, id: PostId, patch: &PostPatch) -> Result<Post, ApiError> {
        let url = self.config.api_url(&format!("/api/posts/{}", id));
        self.json(self.client.patch(&url).json(patch)).await
    }

    async fn delete_post(&self, id: PostId) -> Result<(), ApiError> {
        let url = self.config.api_url(&format!("/api/posts/{}", id));
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    async fn toggle_like(&self, id: PostId) -> Result<Post, ApiError> {
        let url = self.config.api_url(&format!("/api/posts/{}/like", id));
        self.json(self.client.post(&url)).await
    }

    async fn add_comment(&self, id: PostId, comment: &Comment) -> Result<Post, ApiError> {
        let url = self.config.api_url(&format!("/api/posts/{}/comments", id));
        self.json(self.client.post(&url).json(comment)).await
    }

    async fn follow(&self, target: UserId) -> Result<FollowOutcome, ApiError> {
        let url = self.config.api_url(&format!("/api/users/{}/follow", target));
        self.json(self.client.post(&url)).await
    }

    async fn unfollow(&self, target: UserId) -> Result<FollowOutcome, ApiError> {
        let url = self.config.api_url(&format!("/api/users/{}/follow", target));
        self.json(self.client.delete(&url)).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        let url = self.config.api_url("/api/users");
        self.json(self.client.post(&url).json(user)).await
    }
}

impl ReadApi for HttpApi {
    async fn fetch(&self, key: &CacheKey) -> Result<CacheValue, ApiError> {
        debug!("[Api] fetch {}", key);
        let value = match key {
            CacheKey::PostList(scope) => {
                let url = self.config.api_url(&Self::posts_path(scope));
                CacheValue::Posts(self.json::<Vec<Post>>(self.client.get(&url)).await?)
            }
            CacheKey::PostDetail(id) => {
                let url = self.config.api_url(&format!("/api/posts/{}", id));
                CacheValue::Post(self.json::<Post>(self.client.get(&url)).await?)
            }
            CacheKey::UserList => {
                let url = self.config.api_url("/api/users");
                CacheValue::Users(self.json::<Vec<User>>(self.client.get(&url)).await?)
            }
            CacheKey::UserDetail(id) => {
                let url = self.config.api_url(&format!("/api/users/{}", id));
                CacheValue::User(self.json::<User>(self.client.get(&url)).await?)
            }
            CacheKey::Followers(id) => {
                let url = self.config.api_url(&format!("/api/users/{}/followers", id));
                CacheValue::FollowList(self.json::<FollowList>(self.client.get(&url)).await?)
            }
            CacheKey::Following(id) => {
                let url = self.config.api_url(&format!("/api/users/{}/following", id));
                CacheValue::FollowList(self.json::<FollowList>(self.client.get(&url)).await?)
            }
            CacheKey::FollowStats(id) => {
                let url = self.config.api_url(&format!("/api/users/{}/follow-stats", id));
                CacheValue::FollowStats(self.json::<FollowStats>(self.client.get(&url)).await?)
            }
        };
        Ok(value)
    }
}
