//! Cookie-identified session middleware
//!
//! Loads the caller's session before the handler runs and persists it
//! afterwards if anything wrote to it.

use crate::error::{ImpersonateError, Result};
use crate::session::{Session, SessionConfig};
use crate::traits::session::{SessionData, SessionStore};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};
use cookie::{Cookie, SameSite};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Shared state for the session middleware
///
/// # Example
///
/// ```rust,ignore
/// let sessions = SessionManager::new(Arc::new(InMemorySessionStore::new()), SessionConfig::default());
///
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(axum::middleware::from_fn_with_state(sessions, impersonate::session::load_session));
/// ```
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: Arc<SessionConfig>,
    last_purge: Arc<Mutex<Instant>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            last_purge: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Resolve the session for a request, creating a fresh one if needed
    pub async fn open(&self, headers: &HeaderMap) -> Result<Session> {
        if let Some(id) = session_cookie(headers, &self.config.cookie_name) {
            if let Some(data) = self.store.load(&id).await? {
                return Ok(Session::new(id, data, false));
            }
            tracing::debug!(
                target: "impersonate.session",
                "Unknown or expired session cookie, starting a new session"
            );
        }

        Ok(Session::new(
            uuid::Uuid::new_v4().simple().to_string(),
            SessionData::new(self.config.default_ttl()),
            true,
        ))
    }

    /// Persist a modified session; returns the cookie to set for new sessions
    pub async fn persist(&self, session: &Session) -> Result<Option<HeaderValue>> {
        let Some(pending) = session.take_pending().await else {
            return Ok(None);
        };

        self.store.save(&pending.id, pending.data).await?;

        if !pending.is_new {
            return Ok(None);
        }

        let cookie = self.build_cookie(pending.id);
        HeaderValue::from_str(&cookie.to_string())
            .map(Some)
            .map_err(|e| ImpersonateError::internal(format!("Invalid session cookie: {}", e)))
    }

    /// Sweep expired sessions from the store once per purge interval
    ///
    /// Returns the number of sessions removed, or `None` if no sweep was due.
    pub async fn purge_if_due(&self) -> Result<Option<usize>> {
        {
            let mut last_purge = self.last_purge.lock().await;
            if last_purge.elapsed() < self.config.purge_interval() {
                return Ok(None);
            }
            *last_purge = Instant::now();
        }

        let removed = self.store.purge_expired().await?;
        if removed > 0 {
            tracing::debug!(
                target: "impersonate.session",
                removed,
                "Purged expired sessions"
            );
        }
        Ok(Some(removed))
    }

    fn build_cookie(&self, id: String) -> Cookie<'static> {
        let mut builder = Cookie::build((self.config.cookie_name.clone(), id))
            .path(self.config.cookie_path.clone())
            .secure(self.config.cookie_secure)
            .http_only(self.config.cookie_http_only)
            .same_site(SameSite::Lax);

        if let Some(ref domain) = self.config.cookie_domain {
            builder = builder.domain(domain.clone());
        }

        builder.build()
    }
}

/// Middleware function that attaches a [`Session`] to the request
pub async fn load_session(
    State(manager): State<SessionManager>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let session = manager.open(request.headers()).await?;
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if let Some(cookie) = manager.persist(&session).await? {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }

    // A failed sweep is retried next interval; the response is unaffected
    if let Err(e) = manager.purge_if_due().await {
        tracing::warn!(
            target: "impersonate.session",
            error = %e,
            "Failed to purge expired sessions"
        );
    }

    Ok(response)
}

fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|cookie| cookie.ok())
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ImpersonateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ImpersonateError::internal("Session not found in request extensions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;

    fn manager() -> SessionManager {
        SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            SessionConfig::default(),
        )
    }

    #[test]
    fn test_session_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; impersonate_session=abc123"),
        );
        assert_eq!(
            session_cookie(&headers, "impersonate_session").as_deref(),
            Some("abc123")
        );
        assert_eq!(session_cookie(&headers, "missing"), None);
    }

    #[tokio::test]
    async fn test_new_session_persisted_with_cookie() {
        let manager = manager();
        let session = manager.open(&HeaderMap::new()).await.unwrap();
        session.set("_impersonate", "4").await;

        let cookie = manager.persist(&session).await.unwrap().unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("impersonate_session="));
        assert!(cookie.contains("HttpOnly"));

        let id = session.id().await;
        let stored = manager.store().load(&id).await.unwrap().unwrap();
        assert_eq!(stored.get("_impersonate"), Some(&"4".to_string()));
    }

    #[tokio::test]
    async fn test_untouched_session_not_saved() {
        let manager = manager();
        let session = manager.open(&HeaderMap::new()).await.unwrap();
        assert!(manager.persist(&session).await.unwrap().is_none());
        assert!(manager.store().load(&session.id().await).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_existing_session_reloaded_without_new_cookie() {
        let manager = manager();
        let first = manager.open(&HeaderMap::new()).await.unwrap();
        first.set("k", "v").await;
        manager.persist(&first).await.unwrap();

        let mut headers = HeaderMap::new();
        let cookie = format!("impersonate_session={}", first.id().await);
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());

        let second = manager.open(&headers).await.unwrap();
        assert_eq!(second.get("k").await.as_deref(), Some("v"));
        second.set("k", "w").await;
        assert!(manager.persist(&second).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_panic() {
        let manager = SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            SessionConfig {
                default_ttl_seconds: u64::MAX,
                ..SessionConfig::default()
            },
        );
        let session = manager.open(&HeaderMap::new()).await.unwrap();
        session.set("_impersonate", "4").await;
        assert!(manager.persist(&session).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_abandoned_sessions_are_purged() {
        let store = Arc::new(InMemorySessionStore::new());
        let manager = SessionManager::new(
            store.clone(),
            SessionConfig {
                purge_interval_seconds: 0,
                ..SessionConfig::default()
            },
        );

        for i in 0..100 {
            store
                .save(&format!("abandoned-{}", i), SessionData::new(std::time::Duration::ZERO))
                .await
                .unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        for _ in 0..100 {
            let session = manager.open(&HeaderMap::new()).await.unwrap();
            session.set("_impersonate", "4").await;
            manager.persist(&session).await.unwrap();
            manager.purge_if_due().await.unwrap();
        }

        assert_eq!(store.len().await, 100);
    }

    #[tokio::test]
    async fn test_purge_waits_for_interval() {
        let manager = manager();
        assert_eq!(manager.purge_if_due().await.unwrap(), None);
    }
}
