//! Client configuration
//!
//! Resolved in three layers: defaults, then an optional TOML file (by default
//! `<config dir>/blogcast/client.toml`), then environment variables.
//!
//! ```toml
//! server_url = "http://127.0.0.1:3003"
//! user_id = "6f1c2a8e-0000-4000-8000-000000000001"
//! username = "alice"
//! mutation_timeout_ms = 10000
//! reconnect_delay_ms = 2000
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};
use crate::shared::entity::{UserId, UserRef};
use crate::shared::event::SessionId;

/// Delay between broadcast channel reconnect attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub const ENV_API_URL: &str = "BLOGCAST_API_URL";
pub const ENV_USER_ID: &str = "BLOGCAST_USER_ID";
pub const ENV_USERNAME: &str = "BLOGCAST_USERNAME";
pub const ENV_MUTATION_TIMEOUT_MS: &str = "BLOGCAST_MUTATION_TIMEOUT_MS";

/// On-disk shape of `client.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    server_url: Option<String>,
    user_id: Option<Uuid>,
    username: Option<String>,
    name: Option<String>,
    mutation_timeout_ms: Option<u64>,
    reconnect_delay_ms: Option<u64>,
}

/// Client configuration wrapper
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
    actor: Option<UserRef>,
    session_id: SessionId,
    reconnect_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            actor: None,
            session_id: SessionId::new(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self {
            app: builder.build()?,
            ..Self::default()
        })
    }

    /// Defaults, then the default config file if present, then the environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parse `client.toml` contents; `origin` names the source in errors
    pub fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;

        let mut builder = AppConfig::builder();
        if let Some(url) = file.server_url {
            builder = builder.server_url(url);
        }
        if let Some(ms) = file.mutation_timeout_ms {
            builder = builder.mutation_timeout(Duration::from_millis(ms));
        }
        let mut config = Self::with_builder(builder)?;

        if let Some(ms) = file.reconnect_delay_ms {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(id) = file.user_id {
            let username = file.username.unwrap_or_default();
            let name = file.name.unwrap_or_else(|| username.clone());
            config.actor = Some(UserRef {
                id: UserId(id),
                username,
                name,
            });
        }
        Ok(config)
    }

    /// Override values from environment variables looked up through `var`
    pub fn apply_env(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let mut builder = AppConfig::builder()
            .server_url(self.app.server_url.clone())
            .mutation_timeout(self.app.mutation_timeout)
            .event_capacity(self.app.event_capacity);

        if let Some(url) = var(ENV_API_URL) {
            builder = builder.server_url(url);
        }
        if let Some(ms) = var(ENV_MUTATION_TIMEOUT_MS) {
            let ms: u64 = ms.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "mutation_timeout_ms",
                reason: format!("expected milliseconds, got {:?}", ms),
            })?;
            builder = builder.mutation_timeout(Duration::from_millis(ms));
        }
        self.app = builder.build()?;

        if let Some(id) = var(ENV_USER_ID) {
            let id = Uuid::parse_str(id.trim()).map_err(|err| ConfigError::InvalidValue {
                name: "user_id",
                reason: err.to_string(),
            })?;
            let username = var(ENV_USERNAME)
                .or_else(|| self.actor.as_ref().map(|a| a.username.clone()))
                .unwrap_or_default();
            self.actor = Some(UserRef {
                id: UserId(id),
                name: username.clone(),
                username,
            });
        }
        Ok(())
    }

    pub fn with_actor(mut self, actor: UserRef) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path)
    }

    pub fn server_url(&self) -> &str {
        &self.app.server_url
    }

    pub fn mutation_timeout(&self) -> Duration {
        self.app.mutation_timeout
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// The user this client acts as, if configured
    pub fn actor(&self) -> Option<&UserRef> {
        self.actor.as_ref()
    }

    /// The actor, or an error naming the missing setting
    pub fn require_actor(&self) -> Result<&UserRef, ConfigError> {
        self.actor.as_ref().ok_or(ConfigError::MissingValue("user_id"))
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }
}

/// `<config dir>/blogcast/client.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("blogcast").join("client.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_config_new() {
        let config = Config::new();
        assert_eq!(config.server_url(), "http://127.0.0.1:3003");
        assert!(config.actor().is_none());
        assert_eq!(config.reconnect_delay(), DEFAULT_RECONNECT_DELAY);
    }

    #[test]
    fn test_api_url() {
        let config = Config::new();
        assert_eq!(
            config.api_url("/api/posts"),
            "http://127.0.0.1:3003/api/posts"
        );
    }

    #[test]
    fn test_each_config_gets_its_own_session() {
        assert_ne!(Config::new().session_id(), Config::new().session_id());
    }

    #[test]
    fn test_from_file() {
        let id = Uuid::new_v4();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server_url = \"http://blog.test:8080/\"\nuser_id = \"{}\"\nusername = \"alice\"\nmutation_timeout_ms = 250",
            id
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server_url(), "http://blog.test:8080");
        assert_eq!(config.mutation_timeout(), Duration::from_millis(250));
        let actor = config.actor().unwrap();
        assert_eq!(actor.id, UserId(id));
        assert_eq!(actor.username, "alice");
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "colour = \"blue\"").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let id = Uuid::new_v4();
        let env: HashMap<&str, String> = HashMap::from([
            (ENV_API_URL, "https://blog.example".to_string()),
            (ENV_USER_ID, id.to_string()),
            (ENV_USERNAME, "bob".to_string()),
            (ENV_MUTATION_TIMEOUT_MS, "1500".to_string()),
        ]);

        let mut config = Config::new();
        config.apply_env(|name| env.get(name).cloned()).unwrap();

        assert_eq!(config.server_url(), "https://blog.example");
        assert_eq!(config.mutation_timeout(), Duration::from_millis(1500));
        assert_eq!(config.require_actor().unwrap().username, "bob");
    }

    #[test]
    fn test_bad_env_values_rejected() {
        let mut config = Config::new();
        let result = config.apply_env(|name| {
            (name == ENV_MUTATION_TIMEOUT_MS).then(|| "soon".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "mutation_timeout_ms", .. })
        ));

        let result = config.apply_env(|name| (name == ENV_USER_ID).then(|| "nope".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { name: "user_id", .. })));
    }
}
