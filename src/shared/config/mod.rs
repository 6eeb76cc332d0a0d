//! Application configuration module
//!
//! Provides the configuration values shared by the client and the server,
//! built through [`AppConfigBuilder`] and validated before use.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3003";

/// Default client-side bound on one Mutation API call
pub const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Header carrying the acting user's id on Mutation API requests
pub const ACTOR_HEADER: &str = "x-user-id";

/// Header carrying the client session id, echoed as the event origin
pub const SESSION_HEADER: &str = "x-session-id";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server URL
    pub server_url: String,
    /// How long a mutation waits for the server before rolling back
    #[serde(with = "duration_ms")]
    pub mutation_timeout: Duration,
    /// Events buffered per subscriber before it starts lagging
    pub event_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            mutation_timeout: DEFAULT_MUTATION_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if self.mutation_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "mutation_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                name: "event_capacity",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    mutation_timeout: Option<Duration>,
    event_capacity: Option<usize>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn mutation_timeout(mut self, timeout: Duration) -> Self {
        self.mutation_timeout = Some(timeout);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            server_url: self.server_url.unwrap_or(defaults.server_url),
            mutation_timeout: self.mutation_timeout.unwrap_or(defaults.mutation_timeout),
            event_capacity: self.event_capacity.unwrap_or(defaults.event_capacity),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AppConfig::builder().build().unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let config = AppConfig::builder()
            .server_url("http://example.test/")
            .build()
            .unwrap();
        assert_eq!(config.server_url, "http://example.test");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AppConfig::builder().server_url("ftp://x").build(),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            AppConfig::builder().mutation_timeout(Duration::ZERO).build(),
            Err(ConfigError::InvalidValue { name: "mutation_timeout", .. })
        ));
        assert!(matches!(
            AppConfig::builder().event_capacity(0).build(),
            Err(ConfigError::InvalidValue { name: "event_capacity", .. })
        ));
    }
}
