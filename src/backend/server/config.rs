/**
 * Server Configuration
 *
 * Loaded from environment variables (after `dotenv` in the binary), with
 * defaults suitable for local development.
 *
 * - `SERVER_PORT` - listen port (default 3003)
 * - `BLOGCAST_EVENT_CAPACITY` - events buffered per subscriber (default 1000)
 * - `BLOGCAST_CORS_ORIGIN` - allowed browser origin; any origin if unset
 */

use crate::shared::config::{ConfigError, DEFAULT_EVENT_CAPACITY};

pub const DEFAULT_PORT: u16 = 3003;

const PORT_VAR: &str = "SERVER_PORT";
const CAPACITY_VAR: &str = "BLOGCAST_EVENT_CAPACITY";
const CORS_VAR: &str = "BLOGCAST_CORS_ORIGIN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub event_capacity: usize,
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            cors_origin: None,
        }
    }
}

impl ServerConfig {
    /// Read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Resolve from any variable source
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(port) = var(PORT_VAR) {
            config.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "SERVER_PORT",
                reason: format!("not a port number: {}", port),
            })?;
        }
        if let Some(capacity) = var(CAPACITY_VAR) {
            config.event_capacity = match capacity.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "BLOGCAST_EVENT_CAPACITY",
                        reason: format!("must be a positive integer: {}", capacity),
                    })
                }
            };
        }
        config.cors_origin = var(CORS_VAR)
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty());
        Ok(config)
    }
}
