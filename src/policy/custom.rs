//! Pluggable replacements for the default authorization rules.

use crate::error::{ImpersonateError, Result};
use crate::traits::directory::UserDirectory;
use crate::user::User;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Replaces the whole "may this actor impersonate at all" rule
///
/// When installed, its answer is authoritative: the superuser/staff rule is
/// not consulted.
pub trait CustomAllowPolicy: Send + Sync {
    fn allows(&self, actor: &User) -> bool;
}

impl<F> CustomAllowPolicy for F
where
    F: Fn(&User) -> bool + Send + Sync,
{
    fn allows(&self, actor: &User) -> bool {
        self(actor)
    }
}

/// Supplies the pool of users an actor may impersonate
///
/// A tenant-scoped application would return only users of the actor's
/// tenant here.
#[async_trait]
pub trait CustomTargetSetPolicy: Send + Sync {
    async fn impersonable(&self, actor: &User, directory: &dyn UserDirectory) -> Result<Vec<User>>;
}

/// Named strategies that configuration may refer to
///
/// `ImpersonationConfig::custom_allow` and `custom_user_queryset` hold names;
/// this registry maps them to implementations when the impersonation
/// service is built.
#[derive(Clone, Default)]
pub struct PolicyRegistry {
    allow: HashMap<String, Arc<dyn CustomAllowPolicy>>,
    target_sets: HashMap<String, Arc<dyn CustomTargetSetPolicy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_allow(&mut self, name: impl Into<String>, policy: Arc<dyn CustomAllowPolicy>) {
        self.allow.insert(name.into(), policy);
    }

    pub fn register_target_set(
        &mut self,
        name: impl Into<String>,
        policy: Arc<dyn CustomTargetSetPolicy>,
    ) {
        self.target_sets.insert(name.into(), policy);
    }

    /// Look up an allow policy; an unknown name is an operator error.
    pub fn allow(&self, name: &str) -> Result<Arc<dyn CustomAllowPolicy>> {
        self.allow.get(name).cloned().ok_or_else(|| {
            ImpersonateError::configuration(format!(
                "custom_allow refers to '{}' but no allow policy is registered under that name",
                name
            ))
        })
    }

    /// Look up a target set policy; an unknown name is an operator error.
    pub fn target_set(&self, name: &str) -> Result<Arc<dyn CustomTargetSetPolicy>> {
        self.target_sets.get(name).cloned().ok_or_else(|| {
            ImpersonateError::configuration(format!(
                "custom_user_queryset refers to '{}' but no target set policy is registered under that name",
                name
            ))
        })
    }
}
