//! The impersonation service and its builder.

use crate::config::ImpersonationConfig;
use crate::error::{ImpersonateError, Result};
use crate::notify::{ImpersonationListener, NotificationBus};
use crate::policy::{AuthorizationPolicy, CustomAllowPolicy, CustomTargetSetPolicy, PolicyRegistry};
use crate::traits::directory::UserDirectory;
use crate::user::User;
use std::sync::Arc;

/// Shared entry point for starting, stopping and resolving impersonation
///
/// Cheap to clone; build once at startup and hand clones to the middleware
/// and routes.
///
/// # Example
///
/// ```rust,ignore
/// use impersonate::{ImpersonationConfig, ImpersonationManager, TracingListener};
///
/// let manager = ImpersonationManager::builder(Arc::new(directory))
///     .config(ImpersonationConfig::from_env())
///     .listener(Arc::new(TracingListener))
///     .build()?;
/// ```
#[derive(Clone)]
pub struct ImpersonationManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<ImpersonationConfig>,
    policy: AuthorizationPolicy,
    directory: Arc<dyn UserDirectory>,
    bus: NotificationBus,
}

impl ImpersonationManager {
    pub fn builder(directory: Arc<dyn UserDirectory>) -> ImpersonationManagerBuilder {
        ImpersonationManagerBuilder::new(directory)
    }

    /// Manager with default configuration and no listeners.
    pub fn with_defaults(directory: Arc<dyn UserDirectory>) -> Result<Self> {
        Self::builder(directory).build()
    }

    pub fn config(&self) -> &ImpersonationConfig {
        &self.inner.config
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.inner.policy
    }

    pub fn directory(&self) -> &dyn UserDirectory {
        self.inner.directory.as_ref()
    }

    pub fn notifications(&self) -> &NotificationBus {
        &self.inner.bus
    }
}

/// Builder for [`ImpersonationManager`]
#[must_use = "builder does nothing until you call build()"]
pub struct ImpersonationManagerBuilder {
    directory: Arc<dyn UserDirectory>,
    config: ImpersonationConfig,
    registry: PolicyRegistry,
    custom_allow: Option<Arc<dyn CustomAllowPolicy>>,
    custom_target_set: Option<Arc<dyn CustomTargetSetPolicy>>,
    bus: NotificationBus,
}

impl ImpersonationManagerBuilder {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            directory,
            config: ImpersonationConfig::default(),
            registry: PolicyRegistry::new(),
            custom_allow: None,
            custom_target_set: None,
            bus: NotificationBus::new(),
        }
    }

    pub fn config(mut self, config: ImpersonationConfig) -> Self {
        self.config = config;
        self
    }

    /// Install an allow policy directly.
    pub fn allow_policy(mut self, policy: Arc<dyn CustomAllowPolicy>) -> Self {
        self.custom_allow = Some(policy);
        self
    }

    /// Install a target set policy directly.
    pub fn target_set_policy(mut self, policy: Arc<dyn CustomTargetSetPolicy>) -> Self {
        self.custom_target_set = Some(policy);
        self
    }

    /// Make an allow policy selectable by name through `custom_allow`.
    pub fn register_allow_policy(
        mut self,
        name: impl Into<String>,
        policy: Arc<dyn CustomAllowPolicy>,
    ) -> Self {
        self.registry.register_allow(name, policy);
        self
    }

    /// Make a target set policy selectable by name through `custom_user_queryset`.
    pub fn register_target_set_policy(
        mut self,
        name: impl Into<String>,
        policy: Arc<dyn CustomTargetSetPolicy>,
    ) -> Self {
        self.registry.register_target_set(name, policy);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ImpersonationListener>) -> Self {
        self.bus.subscribe(listener);
        self
    }

    /// Build the manager.
    ///
    /// Policies named in the configuration take precedence over ones
    /// installed directly.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration names a policy
    /// that was never registered, a search field users do not have, or an
    /// exclusion pattern that fails to compile.
    pub fn build(self) -> Result<ImpersonationManager> {
        if let Some(field) = self
            .config
            .search_fields
            .iter()
            .find(|field| !User::FIELDS.contains(&field.as_str()))
        {
            return Err(ImpersonateError::configuration(format!(
                "Unknown search field '{}' (expected one of: {})",
                field,
                User::FIELDS.join(", ")
            )));
        }

        let custom_allow = match self.config.custom_allow {
            Some(ref name) => Some(self.registry.allow(name)?),
            None => self.custom_allow,
        };

        let custom_target_set = match self.config.custom_user_queryset {
            Some(ref name) => Some(self.registry.target_set(name)?),
            None => self.custom_target_set,
        };

        let config = Arc::new(self.config);
        let mut policy = AuthorizationPolicy::new(config.clone())?;
        if let Some(allow) = custom_allow {
            policy = policy.with_custom_allow(allow);
        }
        if let Some(target_set) = custom_target_set {
            policy = policy.with_custom_target_set(target_set);
        }

        tracing::debug!(
            target: "impersonate.config",
            require_superuser = config.require_superuser,
            allow_superuser = config.allow_superuser,
            exclusions = config.uri_exclusions.len(),
            listeners = self.bus.len(),
            "Impersonation manager configured"
        );

        Ok(ImpersonationManager {
            inner: Arc::new(Inner {
                config,
                policy,
                directory: self.directory,
                bus: self.bus,
            }),
        })
    }
}
