//! Impersonate - session-based user impersonation for Axum applications
//!
//! Lets privileged users act as another user without their credentials. The
//! impersonation lives in the session; on every request the effective user is
//! resolved lazily and re-checked against the authorization policy.
//!
//! # Features
//!
//! - **Policy**: superuser/staff rules, pluggable allow and target-set overrides
//! - **Lifecycle**: `start`/`stop` backed by the session, with begin/end notifications
//! - **Resolution**: lazy, memoised per-request identity with URL exclusions
//! - **HTTP**: start/stop routes and a paginated, searchable user picker
//! - **Sessions**: cookie-identified sessions over a pluggable store
//! - **Testing**: Alba-style HTTP testing utilities and user fixtures
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, middleware};
//! use impersonate::session::{InMemorySessionStore, SessionManager, load_session};
//! use impersonate::{
//!     Config, ImpersonationManager, ImpersonationRoutes, InMemoryUserDirectory,
//!     resolve_identity,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> impersonate::Result<()> {
//! impersonate::init_tracing();
//! let config = Config::from_env();
//!
//! let manager = ImpersonationManager::builder(Arc::new(InMemoryUserDirectory::new()))
//!     .config(config.impersonation.clone())
//!     .build()?;
//! let sessions = SessionManager::new(
//!     Arc::new(InMemorySessionStore::new()),
//!     config.session.clone(),
//! );
//!
//! // The host's authentication layer sits between the session layer and
//! // `resolve_identity`, inserting `Authenticated(user)` into extensions.
//! let app: Router = Router::new()
//!     .nest("/impersonate", ImpersonationRoutes::new(manager.clone()).router())
//!     .layer(middleware::from_fn_with_state(manager, resolve_identity))
//!     .layer(middleware::from_fn_with_state(sessions, load_session));
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

mod config;
pub mod directory;
mod error;
mod extractors;
pub mod http;
mod lifecycle;
mod manager;
pub mod notify;
pub mod policy;
mod redirect;
mod request;
mod resolver;
pub mod session;
pub mod testing;
pub mod traits;
mod user;
pub mod utils;

// Re-exports for public API
pub use config::{Config, ImpersonationConfig, LoggingConfig};
pub use directory::InMemoryUserDirectory;
pub use error::{ImpersonateError, Result};
pub use extractors::{CurrentUser, Identity};
pub use http::{ImpersonationRoutes, ListContext, Paginator};
pub use lifecycle::{PREV_PATH_KEY, SESSION_KEY};
pub use manager::{ImpersonationManager, ImpersonationManagerBuilder};
pub use notify::{
    ImpersonationEvent, ImpersonationListener, NotificationBus, SessionBegin, SessionEnd,
    TracingListener,
};
pub use policy::{AuthorizationPolicy, CustomAllowPolicy, CustomTargetSetPolicy, PolicyRegistry};
pub use redirect::{RedirectField, redirect_arg, redirect_field, redirect_path};
pub use request::RequestContext;
pub use resolver::{EffectiveIdentity, RequestIdentity, ResolutionState, resolve_identity};
pub use session::{Session, SessionConfig};
pub use traits::{SessionData, SessionStore, UserDirectory};
pub use user::{Authenticated, User};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "impersonate=debug")
/// - `IMPERSONATE_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("IMPERSONATE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    init_subscriber(env_filter, json_logs);
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    init_subscriber(EnvFilter::new(&config.logging.level), config.logging.json);
}

fn init_subscriber(env_filter: EnvFilter, json: bool) {
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
