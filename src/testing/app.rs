//! A fully layered application for end-to-end tests.

use crate::config::ImpersonationConfig;
use crate::directory::InMemoryUserDirectory;
use crate::error::Result;
use crate::extractors::Identity;
use crate::http::ImpersonationRoutes;
use crate::manager::{ImpersonationManager, ImpersonationManagerBuilder};
use crate::notify::{ImpersonationEvent, ImpersonationListener};
use crate::resolver::resolve_identity;
use crate::session::{InMemorySessionStore, SessionConfig, SessionManager, load_session};
use crate::testing::fixtures;
use crate::traits::{SessionData, UserDirectory};
use crate::user::Authenticated;
use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use std::sync::{Arc, Mutex};

/// Header naming the authenticated user's id in tests
#[doc(hidden)]
pub const TEST_USER_HEADER: &str = "x-test-user";

/// Stand-in for the host's authentication layer, for tests only
///
/// Marks the user named by [`TEST_USER_HEADER`] as authenticated. Unknown ids
/// are treated as anonymous.
///
/// **Never mount this in a production router**: any client that sets the
/// header is logged in as that user.
#[doc(hidden)]
pub async fn header_auth(
    State(directory): State<Arc<dyn UserDirectory>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let id = request
        .headers()
        .get(TEST_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(id) = id {
        if let Some(user) = directory.find_by_id(&id).await? {
            request.extensions_mut().insert(Authenticated(user));
        }
    }

    Ok(next.run(request).await)
}

/// Test harness sharing one user directory and session store across apps
///
/// Authenticates through [`header_auth`]; never serve its router.
///
/// Each call to [`router`](Self::router) can use a manager with different
/// settings while sessions persist, so tests can change configuration
/// between requests of the same browser session.
///
/// Routes:
/// - `/impersonate/...` - the [`ImpersonationRoutes`]
/// - `/test-view/` - responds `OK <effective username>`
#[doc(hidden)]
#[derive(Clone)]
pub struct TestApp {
    directory: InMemoryUserDirectory,
    sessions: SessionManager,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Harness over the [`fixtures`] users.
    pub fn new() -> Self {
        Self::with_directory(fixtures::directory())
    }

    pub fn with_directory(directory: InMemoryUserDirectory) -> Self {
        let config = SessionConfig::default();
        let store = InMemorySessionStore::new();
        Self {
            directory,
            sessions: SessionManager::new(Arc::new(store), config),
        }
    }

    pub fn directory(&self) -> &InMemoryUserDirectory {
        &self.directory
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Manager builder over this harness's directory.
    pub fn builder(&self) -> ImpersonationManagerBuilder {
        ImpersonationManager::builder(Arc::new(self.directory.clone()))
    }

    /// Manager with `config` and no overrides.
    pub fn manager(&self, config: ImpersonationConfig) -> ImpersonationManager {
        self.builder()
            .config(config)
            .build()
            .expect("valid impersonation config")
    }

    pub fn router(&self, manager: &ImpersonationManager) -> Router {
        let directory: Arc<dyn UserDirectory> = Arc::new(self.directory.clone());

        Router::new()
            .route("/test-view/", get(test_view))
            .nest("/impersonate", ImpersonationRoutes::new(manager.clone()).router())
            .layer(middleware::from_fn_with_state(manager.clone(), resolve_identity))
            .layer(middleware::from_fn_with_state(directory, header_auth))
            .layer(middleware::from_fn_with_state(self.sessions.clone(), load_session))
    }

    /// Create an empty session and return its id.
    pub async fn open_session(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let data = SessionData::new(self.sessions.config().default_ttl());
        self.sessions
            .store()
            .save(&id, data)
            .await
            .expect("in-memory session save");
        id
    }

    /// `Cookie` header value for session `id`.
    pub fn cookie(&self, id: &str) -> String {
        format!("{}={}", self.sessions.config().cookie_name, id)
    }

    /// Read a value stored in session `id`.
    pub async fn session_value(&self, id: &str, key: &str) -> Option<String> {
        self.sessions
            .store()
            .load(id)
            .await
            .ok()
            .flatten()
            .and_then(|data| data.get(key).cloned())
    }
}

async fn test_view(Identity(identity): Identity) -> String {
    match identity.user {
        Some(user) => format!("OK {}", user),
        None => "OK anonymous".to_string(),
    }
}

/// Listener that keeps every event it receives
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ImpersonationEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ImpersonationEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(ImpersonationEvent::name).collect()
    }
}

impl ImpersonationListener for RecordingListener {
    fn on_event(&self, event: &ImpersonationEvent) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(())
    }
}
