use serde::{Deserialize, Serialize};

use crate::session::SessionConfig;
use crate::utils::{get_env_with_prefix, split_list};

/// Top-level configuration bundling every component's settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub impersonation: ImpersonationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load every section from environment variables
    pub fn from_env() -> Self {
        Self {
            impersonation: ImpersonationConfig::from_env(),
            session: SessionConfig::from_env(),
            logging: LoggingConfig::from_env(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            config.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            config.json = json.parse().unwrap_or(false);
        }
        config
    }
}

/// Impersonation behaviour
///
/// Constructed once per process and shared by reference with the policy,
/// lifecycle and resolver. Every field has a safe default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImpersonationConfig {
    /// Only superusers may start impersonating; staff lose the right.
    #[serde(default)]
    pub require_superuser: bool,

    /// Superusers may impersonate other superusers.
    #[serde(default)]
    pub allow_superuser: bool,

    /// Name of a registered strategy replacing the "may impersonate" rule.
    #[serde(default)]
    pub custom_allow: Option<String>,

    /// Name of a registered strategy supplying the impersonable users.
    #[serde(default)]
    pub custom_user_queryset: Option<String>,

    /// Regex patterns; a matching request path is never served impersonated.
    #[serde(default = "default_uri_exclusions")]
    pub uri_exclusions: Vec<String>,

    /// Query field whose value overrides the post-start/stop redirect.
    #[serde(default)]
    pub redirect_field_name: Option<String>,

    /// Return to the page impersonation started from when it stops.
    #[serde(default)]
    pub use_http_referer: bool,

    /// Redirect target after start/stop.
    #[serde(default)]
    pub redirect_url: Option<String>,

    /// Secondary fallback when `redirect_url` is unset.
    #[serde(default)]
    pub login_redirect_url: Option<String>,

    /// Where anonymous users are sent by the listing guard.
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Page size for user listing and search.
    #[serde(default = "default_paginate_count")]
    pub paginate_count: usize,

    /// User fields matched by search terms.
    #[serde(default = "default_search_fields")]
    pub search_fields: Vec<String>,
}

impl Default for ImpersonationConfig {
    fn default() -> Self {
        Self {
            require_superuser: false,
            allow_superuser: false,
            custom_allow: None,
            custom_user_queryset: None,
            uri_exclusions: default_uri_exclusions(),
            redirect_field_name: None,
            use_http_referer: false,
            redirect_url: None,
            login_redirect_url: None,
            login_url: default_login_url(),
            paginate_count: default_paginate_count(),
            search_fields: default_search_fields(),
        }
    }
}

impl ImpersonationConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load impersonation configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(value) = get_env_with_prefix("REQUIRE_SUPERUSER") {
            config.require_superuser = value.parse().unwrap_or(false);
        }

        if let Some(value) = get_env_with_prefix("ALLOW_SUPERUSER") {
            config.allow_superuser = value.parse().unwrap_or(false);
        }

        if let Some(name) = get_env_with_prefix("CUSTOM_ALLOW") {
            config.custom_allow = Some(name);
        }

        if let Some(name) = get_env_with_prefix("CUSTOM_USER_QUERYSET") {
            config.custom_user_queryset = Some(name);
        }

        if let Some(patterns) = get_env_with_prefix("URI_EXCLUSIONS") {
            config.uri_exclusions = split_list(&patterns);
        }

        if let Some(field) = get_env_with_prefix("REDIRECT_FIELD_NAME") {
            config.redirect_field_name = Some(field);
        }

        if let Some(value) = get_env_with_prefix("USE_HTTP_REFERER") {
            config.use_http_referer = value.parse().unwrap_or(false);
        }

        if let Some(url) = get_env_with_prefix("REDIRECT_URL") {
            config.redirect_url = Some(url);
        }

        if let Some(url) = get_env_with_prefix("LOGIN_REDIRECT_URL") {
            config.login_redirect_url = Some(url);
        }

        if let Some(url) = get_env_with_prefix("LOGIN_URL") {
            config.login_url = url;
        }

        if let Some(count) = get_env_with_prefix("PAGINATE_COUNT") {
            match count.parse::<usize>() {
                Ok(n) if n > 0 => config.paginate_count = n,
                _ => tracing::warn!(value = %count, "Ignoring invalid PAGINATE_COUNT"),
            }
        }

        if let Some(fields) = get_env_with_prefix("SEARCH_FIELDS") {
            config.search_fields = split_list(&fields);
        }

        config
    }

    /// Static redirect target: `redirect_url`, then `login_redirect_url`, then `/`.
    #[must_use]
    pub fn fallback_redirect(&self) -> &str {
        self.redirect_url
            .as_deref()
            .or(self.login_redirect_url.as_deref())
            .unwrap_or("/")
    }

    #[must_use]
    pub fn require_superuser(mut self, require: bool) -> Self {
        self.require_superuser = require;
        self
    }

    #[must_use]
    pub fn allow_superuser(mut self, allow: bool) -> Self {
        self.allow_superuser = allow;
        self
    }

    #[must_use]
    pub fn custom_allow(mut self, name: impl Into<String>) -> Self {
        self.custom_allow = Some(name.into());
        self
    }

    #[must_use]
    pub fn custom_user_queryset(mut self, name: impl Into<String>) -> Self {
        self.custom_user_queryset = Some(name.into());
        self
    }

    #[must_use]
    pub fn uri_exclusions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uri_exclusions = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn redirect_field_name(mut self, field: impl Into<String>) -> Self {
        self.redirect_field_name = Some(field.into());
        self
    }

    #[must_use]
    pub fn use_http_referer(mut self, enabled: bool) -> Self {
        self.use_http_referer = enabled;
        self
    }

    #[must_use]
    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn login_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.login_redirect_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = url.into();
        self
    }

    #[must_use]
    pub fn paginate_count(mut self, count: usize) -> Self {
        self.paginate_count = count.max(1);
        self
    }

    #[must_use]
    pub fn search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_uri_exclusions() -> Vec<String> {
    vec!["^admin/".to_string()]
}

fn default_login_url() -> String {
    "/accounts/login/".to_string()
}

fn default_paginate_count() -> usize {
    20
}

fn default_search_fields() -> Vec<String> {
    ["username", "first_name", "last_name", "email"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImpersonationConfig::new();
        assert!(!config.require_superuser);
        assert!(!config.allow_superuser);
        assert!(!config.use_http_referer);
        assert_eq!(config.uri_exclusions, vec!["^admin/"]);
        assert_eq!(config.paginate_count, 20);
        assert_eq!(config.search_fields.len(), 4);
        assert_eq!(config.fallback_redirect(), "/");
    }

    #[test]
    fn test_fallback_redirect_precedence() {
        let config = ImpersonationConfig::new().login_redirect_url("/home/");
        assert_eq!(config.fallback_redirect(), "/home/");

        let config = config.redirect_url("/after/");
        assert_eq!(config.fallback_redirect(), "/after/");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ImpersonationConfig =
            serde_json::from_str(r#"{"allow_superuser": true, "paginate_count": 5}"#).unwrap();
        assert!(config.allow_superuser);
        assert_eq!(config.paginate_count, 5);
        assert_eq!(config.uri_exclusions, vec!["^admin/"]);
        assert_eq!(config.login_url, "/accounts/login/");
    }

    #[test]
    fn test_from_env() {
        unsafe {
            std::env::set_var("IMPERSONATE_REQUIRE_SUPERUSER", "true");
            std::env::set_var("IMPERSONATE_URI_EXCLUSIONS", "^admin/,^billing/");
            std::env::set_var("IMPERSONATE_PAGINATE_COUNT", "not-a-number");
        }

        let config = ImpersonationConfig::from_env();
        assert!(config.require_superuser);
        assert_eq!(config.uri_exclusions, vec!["^admin/", "^billing/"]);
        assert_eq!(config.paginate_count, 20);

        unsafe {
            std::env::remove_var("IMPERSONATE_REQUIRE_SUPERUSER");
            std::env::remove_var("IMPERSONATE_URI_EXCLUSIONS");
            std::env::remove_var("IMPERSONATE_PAGINATE_COUNT");
        }
    }
}
