//! Session configuration
//!
//! Settings load from an optional TOML file and are then overridden by
//! environment variables:
//!
//! | Variable             | Field        |
//! |----------------------|--------------|
//! | `UNIBOT_BACKEND_URL` | `endpoint`   |
//! | `UNIBOT_API_URL`     | `api_url`    |
//! | `UNIBOT_USERNAME`    | `username`   |
//! | `UNIBOT_LANGUAGE`    | `language`   |

use crate::error::{Result, SessionError};
use crate::language::Language;
use crate::transport::socketio::SocketIoConfig;
use crate::transport::ConnectOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_BACKEND_URL: &str = "UNIBOT_BACKEND_URL";
pub const ENV_API_URL: &str = "UNIBOT_API_URL";
pub const ENV_USERNAME: &str = "UNIBOT_USERNAME";
pub const ENV_LANGUAGE: &str = "UNIBOT_LANGUAGE";

/// Chat session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Chat backend endpoint (default: http://localhost:5000)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// REST API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Stable user id; generated per session when unset
    #[serde(default)]
    pub user_id: Option<String>,

    /// Display name sent with the join handshake
    #[serde(default = "default_username")]
    pub username: String,

    /// Preselected language. When unset the user must choose one first.
    #[serde(default)]
    pub language: Option<Language>,

    /// Seconds to wait for the transport to connect
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub socketio: SocketIoConfig,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

fn default_endpoint() -> String {
    "http://localhost:5000".to_string()
}

fn default_api_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_username() -> String {
    "Student".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    20
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_url: default_api_url(),
            user_id: None,
            username: default_username(),
            language: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            socketio: SocketIoConfig::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SessionError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from a TOML file, falling back to defaults if it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            SessionError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(endpoint) = lookup(ENV_BACKEND_URL) {
            self.endpoint = endpoint;
        }
        if let Some(api_url) = lookup(ENV_API_URL) {
            self.api_url = api_url;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = username;
        }
        if let Some(language) = lookup(ENV_LANGUAGE) {
            self.language = Some(language.parse()?);
        }
        Ok(self)
    }

    /// User id for this session, generating `user_<millis>_<random>` if unset
    pub fn resolve_user_id(&self) -> String {
        match &self.user_id {
            Some(id) => id.clone(),
            None => {
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                format!(
                    "user_{}_{}",
                    chrono::Utc::now().timestamp_millis(),
                    &suffix[..9]
                )
            }
        }
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            auth: None,
        }
    }
}

/// Automatic retry after transport failures
///
/// Disabled by default: the user retries manually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    #[serde(default)]
    pub enabled: bool,

    /// Attempts before giving up and waiting for a manual retry
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    800
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before automatic attempt `attempt` (1-based), or `None` when
    /// automatic retry is off or exhausted
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if !self.enabled || attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let exp = (attempt - 1).min(10);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Some(Duration::from_millis(delay.min(self.max_delay_ms)))
    }
}
