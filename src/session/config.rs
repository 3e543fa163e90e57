use crate::traits::session::MAX_SESSION_TTL;
use crate::utils::get_env_with_prefix;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Default session TTL (in seconds)
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,

    /// Name of the cookie carrying the session ID
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie domain (optional)
    #[serde(default)]
    pub cookie_domain: Option<String>,

    /// Cookie path
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Cookie secure flag (HTTPS only)
    #[serde(default = "default_secure")]
    pub cookie_secure: bool,

    /// Cookie http_only flag
    #[serde(default = "default_http_only")]
    pub cookie_http_only: bool,

    /// Minimum time between sweeps of expired sessions (in seconds)
    #[serde(default = "default_purge_interval_seconds")]
    pub purge_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_ttl_seconds(),
            cookie_name: default_cookie_name(),
            cookie_domain: None,
            cookie_path: default_cookie_path(),
            cookie_secure: default_secure(),
            cookie_http_only: default_http_only(),
            purge_interval_seconds: default_purge_interval_seconds(),
        }
    }
}

impl SessionConfig {
    /// Load session configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ttl) = get_env_with_prefix("SESSION_TTL_SECONDS") {
            match ttl.parse::<u64>() {
                Ok(seconds) if seconds > 0 && seconds <= MAX_SESSION_TTL.as_secs() => {
                    config.default_ttl_seconds = seconds;
                }
                _ => tracing::warn!(
                    target: "impersonate.config",
                    value = %ttl,
                    max = MAX_SESSION_TTL.as_secs(),
                    "Ignoring invalid SESSION_TTL_SECONDS"
                ),
            }
        }

        if let Some(interval) = get_env_with_prefix("SESSION_PURGE_INTERVAL_SECONDS") {
            match interval.parse() {
                Ok(seconds) => config.purge_interval_seconds = seconds,
                Err(_) => tracing::warn!(
                    target: "impersonate.config",
                    value = %interval,
                    "Ignoring invalid SESSION_PURGE_INTERVAL_SECONDS"
                ),
            }
        }

        if let Some(name) = get_env_with_prefix("SESSION_COOKIE_NAME") {
            config.cookie_name = name;
        }

        if let Some(domain) = get_env_with_prefix("SESSION_COOKIE_DOMAIN") {
            config.cookie_domain = Some(domain);
        }

        if let Some(path) = get_env_with_prefix("SESSION_COOKIE_PATH") {
            config.cookie_path = path;
        }

        if let Some(secure) = get_env_with_prefix("SESSION_COOKIE_SECURE") {
            config.cookie_secure = secure.parse().unwrap_or(true);
        }

        if let Some(http_only) = get_env_with_prefix("SESSION_COOKIE_HTTP_ONLY") {
            config.cookie_http_only = http_only.parse().unwrap_or(true);
        }

        config
    }

    /// Session lifetime, capped at [`MAX_SESSION_TTL`]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds).min(MAX_SESSION_TTL)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_seconds)
    }
}

fn default_ttl_seconds() -> u64 {
    3600 * 24 // 24 hours
}

fn default_purge_interval_seconds() -> u64 {
    300
}

fn default_cookie_name() -> String {
    "impersonate_session".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_secure() -> bool {
    true
}

fn default_http_only() -> bool {
    true
}
