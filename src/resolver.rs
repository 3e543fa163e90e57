//! Request-scoped identity resolution.
//!
//! [`resolve_identity`] attaches a [`RequestIdentity`] to every request. The
//! identity is not computed until something asks for it: the first call to
//! [`RequestIdentity::effective`] reads the session, looks the target up and
//! re-runs the policy, and the answer is reused for the rest of the request.

use crate::error::{ImpersonateError, Result};
use crate::lifecycle::SESSION_KEY;
use crate::manager::ImpersonationManager;
use crate::request::RequestContext;
use crate::session::Session;
use crate::user::{Authenticated, User};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;

/// Who the application should treat as the current user for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveIdentity {
    /// The acting user; `None` for anonymous requests.
    pub user: Option<User>,
    /// The real user behind an impersonated request.
    pub impersonator: Option<User>,
    pub is_impersonate: bool,
}

impl EffectiveIdentity {
    fn unchanged(actor: Option<User>) -> Self {
        Self {
            user: actor,
            impersonator: None,
            is_impersonate: false,
        }
    }

    fn substituted(actor: User, target: User) -> Self {
        Self {
            user: Some(target),
            impersonator: Some(actor),
            is_impersonate: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    NotYetResolved,
    ResolvedNoSubstitution,
    ResolvedSubstituted,
}

/// Lazily-resolved identity for the current request
///
/// Cloned out of request extensions; clones share the memoised result.
#[derive(Clone)]
pub struct RequestIdentity {
    inner: Arc<IdentityState>,
}

struct IdentityState {
    manager: ImpersonationManager,
    actor: Option<User>,
    session: Session,
    request: RequestContext,
    resolved: OnceCell<EffectiveIdentity>,
    ended: AtomicBool,
    plain: EffectiveIdentity,
}

impl RequestIdentity {
    pub fn new(
        manager: ImpersonationManager,
        actor: Option<User>,
        session: Session,
        request: RequestContext,
    ) -> Self {
        let plain = EffectiveIdentity::unchanged(actor.clone());
        Self {
            inner: Arc::new(IdentityState {
                manager,
                actor,
                session,
                request,
                resolved: OnceCell::new(),
                ended: AtomicBool::new(false),
                plain,
            }),
        }
    }

    /// The authenticated user, regardless of impersonation.
    pub fn actor(&self) -> Option<&User> {
        self.inner.actor.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn request(&self) -> &RequestContext {
        &self.inner.request
    }

    pub fn manager(&self) -> &ImpersonationManager {
        &self.inner.manager
    }

    /// Resolve (once) and return the effective identity.
    pub async fn effective(&self) -> &EffectiveIdentity {
        if self.inner.ended.load(Ordering::Acquire) {
            return &self.inner.plain;
        }
        self.inner.resolved.get_or_init(|| self.resolve()).await
    }

    /// Effective user, resolving if necessary.
    pub async fn current_user(&self) -> Option<&User> {
        self.effective().await.user.as_ref()
    }

    pub async fn is_impersonate(&self) -> bool {
        self.effective().await.is_impersonate
    }

    pub fn state(&self) -> ResolutionState {
        if self.inner.ended.load(Ordering::Acquire) {
            return ResolutionState::ResolvedNoSubstitution;
        }
        match self.inner.resolved.get() {
            None => ResolutionState::NotYetResolved,
            Some(identity) if identity.is_impersonate => ResolutionState::ResolvedSubstituted,
            Some(_) => ResolutionState::ResolvedNoSubstitution,
        }
    }

    /// Revert to the actor for the remainder of this request.
    pub(crate) fn end_impersonation(&self) {
        self.inner.ended.store(true, Ordering::Release);
    }

    async fn resolve(&self) -> EffectiveIdentity {
        let state = &self.inner;
        let unchanged = || EffectiveIdentity::unchanged(state.actor.clone());

        let Some(ref actor) = state.actor else {
            return unchanged();
        };

        let Some(target_id) = state.session.get(SESSION_KEY).await else {
            return unchanged();
        };

        let manager = &state.manager;
        let target = match manager.directory().find_by_id(&target_id).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                // Stale record: left in place until an explicit stop.
                tracing::debug!(
                    target: "impersonate.resolver",
                    actor_id = %actor.id,
                    target_user_id = %target_id,
                    "Impersonation target no longer exists"
                );
                return unchanged();
            }
            Err(e) => {
                tracing::warn!(
                    target: "impersonate.resolver",
                    actor_id = %actor.id,
                    target_user_id = %target_id,
                    error = %e,
                    "Failed to look up impersonation target"
                );
                return unchanged();
            }
        };

        let policy = manager.policy();
        let allowed = match policy.can_target(actor, &target, manager.directory()).await {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(
                    target: "impersonate.resolver",
                    actor_id = %actor.id,
                    target_user_id = %target.id,
                    error = %e,
                    "Failed to evaluate impersonation policy"
                );
                false
            }
        };

        if !allowed || !policy.path_allowed(&state.request.path) {
            tracing::debug!(
                target: "impersonate.resolver",
                actor_id = %actor.id,
                target_user_id = %target.id,
                path = %state.request.path,
                user_allowed = allowed,
                "Impersonation not applied to this request"
            );
            return unchanged();
        }

        EffectiveIdentity::substituted(actor.clone(), target)
    }
}

impl std::fmt::Debug for RequestIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestIdentity")
            .field("actor", &self.inner.actor)
            .field("path", &self.inner.request.path)
            .field("state", &self.state())
            .finish()
    }
}

/// Middleware function that attaches a [`RequestIdentity`] to the request
///
/// Must run inside the session layer and after the host's authentication,
/// which marks the real user with [`Authenticated`].
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(axum::middleware::from_fn_with_state(manager, impersonate::resolve_identity))
///     .layer(axum::middleware::from_fn(my_auth))
///     .layer(axum::middleware::from_fn_with_state(sessions, impersonate::session::load_session));
/// ```
pub async fn resolve_identity(
    State(manager): State<ImpersonationManager>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let (mut parts, body) = request.into_parts();

    let session = parts.extensions.get::<Session>().cloned().ok_or_else(|| {
        ImpersonateError::internal("Session not found in request extensions")
    })?;
    let actor = parts
        .extensions
        .get::<Authenticated>()
        .map(|authenticated| authenticated.0.clone());

    let identity = RequestIdentity::new(manager, actor, session, RequestContext::from_parts(&parts));
    parts.extensions.insert(identity);

    Ok(next.run(Request::from_parts(parts, body)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImpersonationConfig;
    use crate::directory::InMemoryUserDirectory;
    use crate::traits::session::SessionData;
    use std::time::Duration;

    fn directory() -> InMemoryUserDirectory {
        InMemoryUserDirectory::with_users([
            User::new("1", "root").superuser(),
            User::new("2", "admin").superuser(),
            User::new("3", "staff").staff(),
            User::new("4", "regular"),
        ])
    }

    fn manager(dir: &InMemoryUserDirectory, config: ImpersonationConfig) -> ImpersonationManager {
        ImpersonationManager::builder(Arc::new(dir.clone()))
            .config(config)
            .build()
            .unwrap()
    }

    async fn session_with(target: Option<&str>) -> Session {
        let session = Session::new("sid", SessionData::new(Duration::from_secs(60)), false);
        if let Some(id) = target {
            session.set(SESSION_KEY, id).await;
        }
        session
    }

    fn root() -> User {
        User::new("1", "root").superuser()
    }

    #[tokio::test]
    async fn test_substitutes_target() {
        let dir = directory();
        let identity = RequestIdentity::new(
            manager(&dir, ImpersonationConfig::default()),
            Some(root()),
            session_with(Some("4")).await,
            RequestContext::for_path("/shop/cart"),
        );

        assert_eq!(identity.state(), ResolutionState::NotYetResolved);
        let effective = identity.effective().await;
        assert_eq!(effective.user.as_ref().unwrap().id, "4");
        assert_eq!(effective.impersonator.as_ref().unwrap().id, "1");
        assert!(effective.is_impersonate);
        assert_eq!(identity.state(), ResolutionState::ResolvedSubstituted);
    }

    #[tokio::test]
    async fn test_excluded_path_keeps_actor() {
        let dir = directory();
        let identity = RequestIdentity::new(
            manager(&dir, ImpersonationConfig::default()),
            Some(root()),
            session_with(Some("4")).await,
            RequestContext::for_path("/admin/settings"),
        );

        let effective = identity.effective().await;
        assert_eq!(effective.user.as_ref().unwrap().id, "1");
        assert!(effective.impersonator.is_none());
        assert!(!effective.is_impersonate);
        assert_eq!(identity.state(), ResolutionState::ResolvedNoSubstitution);
    }

    #[tokio::test]
    async fn test_anonymous_never_substitutes() {
        let dir = directory();
        let identity = RequestIdentity::new(
            manager(&dir, ImpersonationConfig::default()),
            None,
            session_with(Some("4")).await,
            RequestContext::for_path("/"),
        );
        let effective = identity.effective().await;
        assert!(effective.user.is_none());
        assert!(!effective.is_impersonate);
    }

    #[tokio::test]
    async fn test_stale_record_is_ignored_but_kept() {
        let dir = directory();
        let session = session_with(Some("999")).await;
        let identity = RequestIdentity::new(
            manager(&dir, ImpersonationConfig::default()),
            Some(root()),
            session.clone(),
            RequestContext::for_path("/"),
        );

        assert_eq!(identity.current_user().await.unwrap().id, "1");
        assert!(!identity.is_impersonate().await);
        assert_eq!(session.get(SESSION_KEY).await.as_deref(), Some("999"));
    }

    #[tokio::test]
    async fn test_policy_revalidated_on_each_request() {
        let dir = directory();
        let session = session_with(Some("3")).await;

        let identity = RequestIdentity::new(
            manager(&dir, ImpersonationConfig::default()),
            Some(root()),
            session.clone(),
            RequestContext::for_path("/"),
        );
        assert!(identity.is_impersonate().await);

        // Target promoted to superuser after impersonation began
        dir.insert(User::new("3", "staff").superuser()).await;
        let identity = RequestIdentity::new(
            manager(&dir, ImpersonationConfig::default()),
            Some(root()),
            session.clone(),
            RequestContext::for_path("/"),
        );
        assert!(!identity.is_impersonate().await);
        assert!(session.contains(SESSION_KEY).await);
    }

    #[tokio::test]
    async fn test_custom_allow_false_denies_existing_record() {
        let dir = directory();
        let manager = ImpersonationManager::builder(Arc::new(dir.clone()))
            .allow_policy(Arc::new(|_: &User| false))
            .build()
            .unwrap();
        let identity = RequestIdentity::new(
            manager,
            Some(root()),
            session_with(Some("4")).await,
            RequestContext::for_path("/test-view/"),
        );
        assert_eq!(identity.current_user().await.unwrap().username, "root");
    }

    #[tokio::test]
    async fn test_resolution_is_memoised() {
        let dir = directory();
        let session = session_with(Some("4")).await;
        let identity = RequestIdentity::new(
            manager(&dir, ImpersonationConfig::default()),
            Some(root()),
            session.clone(),
            RequestContext::for_path("/"),
        );
        assert!(identity.is_impersonate().await);

        // Later changes within the same request are not observed
        dir.remove("4").await;
        assert!(identity.clone().is_impersonate().await);
    }

    #[tokio::test]
    async fn test_end_impersonation_restores_actor() {
        let dir = directory();
        let identity = RequestIdentity::new(
            manager(&dir, ImpersonationConfig::default()),
            Some(root()),
            session_with(Some("4")).await,
            RequestContext::for_path("/"),
        );
        assert!(identity.is_impersonate().await);

        identity.end_impersonation();
        let effective = identity.effective().await;
        assert_eq!(effective.user.as_ref().unwrap().id, "1");
        assert!(effective.impersonator.is_none());
        assert!(!effective.is_impersonate);
    }
}
