//! Authorization rules for impersonation.
//!
//! Pure decisions over the configuration and the users involved:
//! who may impersonate, whom, and on which request paths.

mod custom;

pub use custom::{CustomAllowPolicy, CustomTargetSetPolicy, PolicyRegistry};

use crate::config::ImpersonationConfig;
use crate::error::{ImpersonateError, Result};
use crate::traits::directory::UserDirectory;
use crate::user::User;
use regex::Regex;
use std::sync::Arc;

/// Decides who may impersonate whom
#[derive(Clone)]
pub struct AuthorizationPolicy {
    config: Arc<ImpersonationConfig>,
    exclusions: Arc<Vec<Regex>>,
    custom_allow: Option<Arc<dyn CustomAllowPolicy>>,
    custom_target_set: Option<Arc<dyn CustomTargetSetPolicy>>,
}

impl std::fmt::Debug for AuthorizationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationPolicy")
            .field("exclusions", &self.exclusions)
            .field("custom_allow", &self.custom_allow.is_some())
            .field("custom_target_set", &self.custom_target_set.is_some())
            .finish()
    }
}

impl AuthorizationPolicy {
    /// Build the policy, compiling the path exclusion patterns.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any exclusion pattern is not a valid regex.
    pub fn new(config: Arc<ImpersonationConfig>) -> Result<Self> {
        let exclusions = config
            .uri_exclusions
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    ImpersonateError::configuration(format!(
                        "Invalid uri_exclusions pattern '{}': {}",
                        pattern, e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            exclusions: Arc::new(exclusions),
            custom_allow: None,
            custom_target_set: None,
        })
    }

    #[must_use]
    pub fn with_custom_allow(mut self, policy: Arc<dyn CustomAllowPolicy>) -> Self {
        self.custom_allow = Some(policy);
        self
    }

    #[must_use]
    pub fn with_custom_target_set(mut self, policy: Arc<dyn CustomTargetSetPolicy>) -> Self {
        self.custom_target_set = Some(policy);
        self
    }

    pub fn config(&self) -> &ImpersonationConfig {
        &self.config
    }

    /// Staff members may impersonate unless superuser is required.
    pub fn allows_staff(&self) -> bool {
        !self.config.require_superuser
    }

    /// May `actor` impersonate anyone at all?
    pub fn can_initiate(&self, actor: &User) -> bool {
        if let Some(ref custom) = self.custom_allow {
            return custom.allows(actor);
        }

        actor.is_superuser || (actor.is_staff && self.allows_staff())
    }

    /// May `actor` impersonate `target` specifically?
    pub async fn can_target(
        &self,
        actor: &User,
        target: &User,
        directory: &dyn UserDirectory,
    ) -> Result<bool> {
        if !self.can_initiate(actor) {
            return Ok(false);
        }

        if target.is_superuser && !(self.config.allow_superuser && actor.is_superuser) {
            return Ok(false);
        }

        self.in_impersonable_set(actor, target, directory).await
    }

    /// Users `actor` may pick from. Defaults to everyone.
    pub async fn impersonable_set(
        &self,
        actor: &User,
        directory: &dyn UserDirectory,
    ) -> Result<Vec<User>> {
        match self.custom_target_set {
            Some(ref custom) => custom.impersonable(actor, directory).await,
            None => directory.all().await,
        }
    }

    async fn in_impersonable_set(
        &self,
        actor: &User,
        target: &User,
        directory: &dyn UserDirectory,
    ) -> Result<bool> {
        match self.custom_target_set {
            Some(ref custom) => Ok(custom
                .impersonable(actor, directory)
                .await?
                .iter()
                .any(|u| u.id == target.id)),
            // Every user is impersonable; the target was resolved from the directory.
            None => Ok(true),
        }
    }

    /// May the request path be served under impersonation?
    ///
    /// Patterns are searched, not anchored, against the path with any
    /// leading `/` stripped.
    pub fn path_allowed(&self, path: &str) -> bool {
        let path = path.strip_prefix('/').unwrap_or(path);
        !self.exclusions.iter().any(|pattern| pattern.is_match(path))
    }
}
