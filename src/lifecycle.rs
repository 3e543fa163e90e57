//! Starting and stopping impersonation.

use crate::error::Result;
use crate::manager::ImpersonationManager;
use crate::notify::{ImpersonationEvent, SessionBegin, SessionEnd};
use crate::redirect::redirect_path;
use crate::resolver::RequestIdentity;
use crate::user::User;

/// Session key holding the impersonated user's id
pub const SESSION_KEY: &str = "_impersonate";

/// Session key holding the page impersonation was started from
pub const PREV_PATH_KEY: &str = "_impersonate_prev_path";

impl ImpersonationManager {
    /// Begin impersonating `target` on behalf of the request's actor.
    ///
    /// Returns `Ok(false)` without touching the session or notifying anyone
    /// when the actor is anonymous or not allowed to impersonate `target`.
    /// Any impersonation already in progress is stopped first.
    ///
    /// # Errors
    ///
    /// Only propagates failures of a custom target set policy.
    pub async fn start(&self, identity: &RequestIdentity, target: &User) -> Result<bool> {
        let Some(actor) = identity.actor() else {
            tracing::debug!(
                target: "impersonate.rejected",
                target_user_id = %target.id,
                reason = "anonymous",
                "Impersonation not started"
            );
            return Ok(false);
        };

        if !self.policy().can_target(actor, target, self.directory()).await? {
            tracing::warn!(
                target: "impersonate.rejected",
                actor_id = %actor.id,
                target_user_id = %target.id,
                reason = "not_allowed",
                "Impersonation not started"
            );
            return Ok(false);
        }

        self.stop(identity).await;

        let session = identity.session();
        session.set(SESSION_KEY, target.id.clone()).await;
        if let Some(prev_path) = identity.request().absolute_referer() {
            session.set(PREV_PATH_KEY, prev_path).await;
        }

        self.notifications()
            .emit(&ImpersonationEvent::SessionBegin(SessionBegin {
                impersonator: actor.clone(),
                impersonating: target.clone(),
                request: identity.request().clone(),
            }));

        tracing::info!(
            target: "impersonate.started",
            actor_id = %actor.id,
            target_user_id = %target.id,
            "Impersonation started"
        );

        Ok(true)
    }

    /// End any active impersonation and return where to send the user.
    ///
    /// Safe to call when nothing is being impersonated: no notification is
    /// sent, and a destination is still returned.
    pub async fn stop(&self, identity: &RequestIdentity) -> String {
        let session = identity.session();
        let impersonating = session.pop(SESSION_KEY).await;
        let prev_path = session.pop(PREV_PATH_KEY).await;

        if let Some(target_id) = impersonating {
            identity.end_impersonation();

            self.notifications()
                .emit(&ImpersonationEvent::SessionEnd(SessionEnd {
                    impersonator: identity.actor().cloned(),
                    impersonating: target_id.clone(),
                    request: identity.request().clone(),
                }));

            tracing::info!(
                target: "impersonate.ended",
                actor_id = identity.actor().map(|u| u.id.as_str()).unwrap_or("anonymous"),
                target_user_id = %target_id,
                "Impersonation ended"
            );
        }

        match prev_path {
            Some(path) if self.config().use_http_referer => path,
            _ => redirect_path(self.config(), identity.request()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImpersonationConfig;
    use crate::directory::InMemoryUserDirectory;
    use crate::error::Result;
    use crate::notify::ImpersonationEvent;
    use crate::request::RequestContext;
    use crate::session::Session;
    use crate::traits::session::SessionData;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Events = Arc<Mutex<Vec<ImpersonationEvent>>>;

    fn root() -> User {
        User::new("1", "user1").superuser()
    }

    fn admin() -> User {
        User::new("2", "user2").superuser()
    }

    fn staff() -> User {
        User::new("3", "user3").staff()
    }

    fn regular() -> User {
        User::new("4", "user4")
    }

    fn setup(config: ImpersonationConfig) -> (ImpersonationManager, Events) {
        let dir = InMemoryUserDirectory::with_users([root(), admin(), staff(), regular()]);
        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let manager = ImpersonationManager::builder(Arc::new(dir))
            .config(config)
            .listener(Arc::new(move |event: &ImpersonationEvent| -> Result<()> {
                sink.lock().unwrap().push(event.clone());
                Ok(())
            }))
            .build()
            .unwrap();
        (manager, events)
    }

    fn identity(
        manager: &ImpersonationManager,
        actor: Option<User>,
        session: &Session,
        request: RequestContext,
    ) -> RequestIdentity {
        RequestIdentity::new(manager.clone(), actor, session.clone(), request)
    }

    fn new_session() -> Session {
        Session::new("sid", SessionData::new(Duration::from_secs(60)), true)
    }

    #[tokio::test]
    async fn test_start_and_stop_scenario() {
        let (manager, events) = setup(ImpersonationConfig::default());
        let session = new_session();

        let start = identity(&manager, Some(root()), &session, RequestContext::for_path("/impersonate/4/"));
        assert!(manager.start(&start, &regular()).await.unwrap());
        assert_eq!(session.get(SESSION_KEY).await.as_deref(), Some("4"));
        assert!(session.is_modified().await);

        {
            let events = events.lock().unwrap();
            assert_eq!(events.len(), 1);
            match &events[0] {
                ImpersonationEvent::SessionBegin(begin) => {
                    assert_eq!(begin.impersonator.username, "user1");
                    assert_eq!(begin.impersonating.username, "user4");
                    assert_eq!(begin.request.path, "/impersonate/4/");
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        let stop = identity(&manager, Some(root()), &session, RequestContext::for_path("/impersonate/stop/"));
        assert!(stop.is_impersonate().await);
        let destination = manager.stop(&stop).await;
        assert_eq!(destination, "/");
        assert!(!stop.is_impersonate().await);
        assert_eq!(stop.current_user().await.unwrap().id, "1");
        assert!(session.get(SESSION_KEY).await.is_none());

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        match &events[1] {
            ImpersonationEvent::SessionEnd(end) => {
                assert_eq!(end.impersonator.as_ref().unwrap().username, "user1");
                assert_eq!(end.impersonating, "4");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unprivileged_start_is_silent_noop() {
        let (manager, events) = setup(ImpersonationConfig::default());
        let session = new_session();
        let request = identity(&manager, Some(regular()), &session, RequestContext::for_path("/"));

        for target in [root(), staff()] {
            assert!(!manager.start(&request, &target).await.unwrap());
        }
        assert!(session.get(SESSION_KEY).await.is_none());
        assert!(!session.is_modified().await);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cannot_start_on_superuser() {
        let (manager, _) = setup(ImpersonationConfig::default());
        let session = new_session();

        let request = identity(&manager, Some(root()), &session, RequestContext::for_path("/"));
        assert!(!manager.start(&request, &admin()).await.unwrap());

        let request = identity(&manager, Some(staff()), &session, RequestContext::for_path("/"));
        assert!(!manager.start(&request, &admin()).await.unwrap());
        assert!(session.get(SESSION_KEY).await.is_none());
    }

    #[tokio::test]
    async fn test_staff_start_respects_require_superuser() {
        let (manager, _) = setup(ImpersonationConfig::default());
        let session = new_session();
        let request = identity(&manager, Some(staff()), &session, RequestContext::for_path("/"));
        assert!(manager.start(&request, &regular()).await.unwrap());

        let (manager, _) = setup(ImpersonationConfig::default().require_superuser(true));
        let session = new_session();
        let request = identity(&manager, Some(staff()), &session, RequestContext::for_path("/"));
        assert!(!manager.start(&request, &regular()).await.unwrap());
        assert!(session.get(SESSION_KEY).await.is_none());
    }

    #[tokio::test]
    async fn test_anonymous_start_is_noop() {
        let (manager, events) = setup(ImpersonationConfig::default());
        let session = new_session();
        let request = identity(&manager, None, &session, RequestContext::for_path("/"));
        assert!(!manager.start(&request, &regular()).await.unwrap());
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_replaces_existing_impersonation() {
        let (manager, events) = setup(ImpersonationConfig::default());
        let session = new_session();
        let request = identity(&manager, Some(root()), &session, RequestContext::for_path("/"));

        assert!(manager.start(&request, &regular()).await.unwrap());
        assert!(manager.start(&request, &staff()).await.unwrap());
        assert_eq!(session.get(SESSION_KEY).await.as_deref(), Some("3"));

        let names: Vec<_> = events.lock().unwrap().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["session_begin", "session_end", "session_begin"]);
    }

    #[tokio::test]
    async fn test_double_stop_is_safe() {
        let (manager, events) = setup(ImpersonationConfig::default().redirect_url("/after/"));
        let session = new_session();
        let request = identity(&manager, Some(root()), &session, RequestContext::for_path("/"));
        manager.start(&request, &regular()).await.unwrap();

        assert_eq!(manager.stop(&request).await, "/after/");
        assert_eq!(manager.stop(&request).await, "/after/");

        let names: Vec<_> = events.lock().unwrap().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["session_begin", "session_end"]);
    }

    #[tokio::test]
    async fn test_stop_without_impersonation() {
        let (manager, events) = setup(ImpersonationConfig::default());
        let session = new_session();
        let request = identity(&manager, None, &session, RequestContext::for_path("/"));
        assert_eq!(manager.stop(&request).await, "/");
        assert!(!session.is_modified().await);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_referer_captured_and_honored() {
        let (manager, _) = setup(ImpersonationConfig::default().use_http_referer(true));
        let session = new_session();
        let start = identity(
            &manager,
            Some(root()),
            &session,
            RequestContext::for_path("/impersonate/4/")
                .with_host("example.com")
                .with_referer("/shop/cart"),
        );
        manager.start(&start, &regular()).await.unwrap();
        assert_eq!(
            session.get(PREV_PATH_KEY).await.as_deref(),
            Some("http://example.com/shop/cart")
        );

        let stop = identity(
            &manager,
            Some(root()),
            &session,
            RequestContext::for_path("/impersonate/stop/?next=/elsewhere/"),
        );
        assert_eq!(manager.stop(&stop).await, "http://example.com/shop/cart");
        assert!(session.get(PREV_PATH_KEY).await.is_none());
    }

    #[tokio::test]
    async fn test_referer_ignored_unless_enabled() {
        let (manager, _) = setup(ImpersonationConfig::default().redirect_field_name("next"));
        let session = new_session();
        let start = identity(
            &manager,
            Some(root()),
            &session,
            RequestContext::for_path("/impersonate/4/")
                .with_host("example.com")
                .with_referer("/shop/cart"),
        );
        manager.start(&start, &regular()).await.unwrap();

        let stop = identity(
            &manager,
            Some(root()),
            &session,
            RequestContext::for_path("/impersonate/stop/?next=/foo"),
        );
        assert_eq!(manager.stop(&stop).await, "/foo");
        // The saved path is consumed either way
        assert!(session.get(PREV_PATH_KEY).await.is_none());
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_abort_start() {
        let dir = InMemoryUserDirectory::with_users([root(), regular()]);
        let manager = ImpersonationManager::builder(Arc::new(dir))
            .listener(Arc::new(|_: &ImpersonationEvent| -> Result<()> {
                Err(crate::error::ImpersonateError::internal("listener down"))
            }))
            .build()
            .unwrap();
        let session = new_session();
        let request = identity(&manager, Some(root()), &session, RequestContext::for_path("/"));

        assert!(manager.start(&request, &regular()).await.unwrap());
        assert_eq!(session.get(SESSION_KEY).await.as_deref(), Some("4"));
    }
}
